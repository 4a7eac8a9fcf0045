//! The billing engine: wires the pure rule functions to the record store.
//!
//! RULES:
//!   - Every operation takes `now` explicitly. Nothing here reads a clock.
//!   - Each consumer update is one store transaction: load, transform, write,
//!     log events, commit.
//!   - Sweeps process consumers one transaction at a time. A failure stops
//!     the sweep; consumers already processed stay committed, and a re-run
//!     picks up where it stopped (fine application is idempotent).

use crate::{
    config::BillingConfig,
    consumer::{BillingState, ConsumerProfile, ConsumerRecord, FineDetails, MeterDetails, PaymentStatus, ProfileUpdate},
    error::{BillingError, BillingResult},
    event::{BillingEvent, EventLogEntry},
    fine::{evaluate_overdue_and_fine, settle_zero_balance, FineEvaluation, FineOutcome},
    reading::{has_reading_in_cycle, try_accept_reading, ReadingSubmission},
    reminder::{classify_reminder, mark_reminder_sent, Reminder},
    settlement::settle_payment,
    store::BillingStore,
    summary::BillSummary,
    types::{ConsumerNumber, Money},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub struct BillingEngine {
    pub config: BillingConfig,
    pub store:  BillingStore,
}

/// Outcome of `mark_paid`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentReceipt {
    pub consumer_number: ConsumerNumber,
    pub paid_amount:     Money,
    pub fine_included:   bool,
    pub paid_at:         DateTime<Utc>,
    /// False when nothing was owed and the record was left untouched.
    pub settled:         bool,
}

/// A consumer carrying a fine after a sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinedConsumer {
    pub consumer_number:   ConsumerNumber,
    pub name:              String,
    pub tariff_plan:       String,
    pub amount:            Money,
    pub fine:              FineDetails,
    pub fine_applied_date: Option<DateTime<Utc>>,
    pub payment_status:    PaymentStatus,
    /// Fined during this sweep rather than an earlier one.
    pub newly_fined:       bool,
}

/// A consumer with no reading in the current cycle after its reading
/// window closed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissedReading {
    pub consumer_number:      ConsumerNumber,
    pub name:                 String,
    pub meter_serial_number:  String,
    pub last_bill_date:       Option<DateTime<Utc>>,
    pub reading_window_start: NaiveDate,
    pub reading_window_end:   NaiveDate,
}

/// A reminder issued for the first time for the current bill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssuedReminder {
    pub consumer_number: ConsumerNumber,
    pub reminder:        Reminder,
}

impl BillingEngine {
    pub fn new(config: BillingConfig, store: BillingStore) -> Self {
        Self { config, store }
    }

    /// Engine over a migrated in-memory store with the built-in config.
    pub fn build_test() -> BillingResult<Self> {
        let store = BillingStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(BillingConfig::default_test(), store))
    }

    // ── Consumers ──────────────────────────────────────────────

    pub fn register_consumer(
        &mut self,
        profile: ConsumerProfile,
        tariff_plan: &str,
        initial_reading: f64,
        now: DateTime<Utc>,
    ) -> BillingResult<ConsumerRecord> {
        self.config.tariffs.rate_for(tariff_plan)?;
        if !initial_reading.is_finite() || initial_reading < 0.0 {
            return Err(BillingError::InvalidReadingInput {
                reason: format!("initial reading {initial_reading} must be a non-negative number"),
            });
        }

        let record = ConsumerRecord {
            billing: BillingState::new(tariff_plan, initial_reading),
            profile,
        };
        let event = BillingEvent::ConsumerRegistered {
            at: now,
            consumer_number: record.profile.consumer_number.clone(),
            tariff_plan: tariff_plan.to_string(),
        };
        self.store.insert_consumer(&record, &event)?;
        log::info!(
            "billing: consumer={} registered on plan '{tariff_plan}'",
            record.profile.consumer_number
        );
        Ok(record)
    }

    pub fn consumer(&self, consumer_number: &str) -> BillingResult<ConsumerRecord> {
        self.store.require_consumer(consumer_number)
    }

    /// Fetch a consumer for display. A Pending bill with nothing owed is
    /// settled as Paid and persisted before the record is returned.
    pub fn load_consumer(&mut self, consumer_number: &str, now: DateTime<Utc>) -> BillingResult<ConsumerRecord> {
        self.store.with_consumer(consumer_number, |record| {
            let events = match settle_zero_balance(&record.billing) {
                Some(evaluation) => {
                    let events = evaluation_events(consumer_number, &evaluation, now);
                    record.billing = evaluation.state;
                    events
                }
                None => Vec::new(),
            };
            Ok((record.clone(), events))
        })
    }

    pub fn all_consumers(&self) -> BillingResult<Vec<ConsumerRecord>> {
        self.store.all_consumers()
    }

    pub fn update_profile(
        &mut self,
        consumer_number: &str,
        update: ProfileUpdate,
    ) -> BillingResult<ConsumerRecord> {
        if let Some(plan) = &update.tariff_plan {
            self.config.tariffs.rate_for(plan)?;
        }
        self.store.with_consumer(consumer_number, |record| {
            let p = &mut record.profile;
            if let Some(v) = update.meter_serial_number { p.meter_serial_number = v; }
            if let Some(v) = update.name                { p.name = v; }
            if let Some(v) = update.address             { p.address = v; }
            if let Some(v) = update.phone_number        { p.phone_number = v; }
            if let Some(v) = update.tariff_plan         { record.billing.tariff_plan = v; }
            Ok((record.clone(), Vec::new()))
        })
    }

    pub fn delete_consumer(&mut self, consumer_number: &str) -> BillingResult<()> {
        if !self.store.delete_consumer(consumer_number)? {
            return Err(BillingError::ConsumerNotFound {
                consumer_number: consumer_number.to_string(),
            });
        }
        log::info!("billing: consumer={consumer_number} deleted");
        Ok(())
    }

    pub fn meter_details(&self, consumer_number: &str) -> BillingResult<MeterDetails> {
        Ok(MeterDetails::from_record(&self.consumer(consumer_number)?))
    }

    pub fn events_for_consumer(&self, consumer_number: &str) -> BillingResult<Vec<EventLogEntry>> {
        self.store.events_for_consumer(consumer_number)
    }

    // ── Readings ───────────────────────────────────────────────

    pub fn submit_reading(
        &mut self,
        consumer_number: &str,
        submission: &ReadingSubmission,
        now: DateTime<Utc>,
    ) -> BillingResult<ConsumerRecord> {
        let config = &self.config;
        let result = self.store.with_consumer(consumer_number, |record| {
            let accepted = try_accept_reading(
                &record.billing,
                submission,
                &config.calendar,
                &config.tariffs,
            )?;
            let event = BillingEvent::ReadingAccepted {
                at: now,
                consumer_number: consumer_number.to_string(),
                reading_date: submission.reading_date,
                new_reading: accepted.state.current_reading,
                units_consumed: accepted.units_consumed,
                amount: accepted.amount,
                deadline: config.calendar.resolve_at(submission.reading_date).payment_deadline(),
                admin_override: submission.admin_override,
            };
            log::info!(
                "billing: consumer={consumer_number} reading accepted: units={} rate={} amount={:.2}{}",
                accepted.units_consumed,
                accepted.rate,
                accepted.amount,
                if submission.admin_override { " (admin override)" } else { "" }
            );
            record.billing = accepted.state;
            Ok((record.clone(), vec![event]))
        });

        if let Err(err) = &result {
            if matches!(err, BillingError::ConsumerNotFound { .. }) || !err.is_rejection() {
                return result;
            }
            log::warn!("billing: consumer={consumer_number} reading rejected: {err}");
            let rejected = BillingEvent::ReadingRejected {
                at: now,
                consumer_number: consumer_number.to_string(),
                reason: err.kind().to_string(),
            };
            if let Err(log_err) = self.store.append_event(&rejected) {
                log::warn!("billing: consumer={consumer_number} could not log rejection: {log_err}");
            }
        }
        result
    }

    // ── Bills ──────────────────────────────────────────────────

    /// Evaluate fines at `now`, persist the result, and summarise the bill.
    pub fn bill_summary(&mut self, consumer_number: &str, now: DateTime<Utc>) -> BillingResult<BillSummary> {
        let config = &self.config;
        self.store.with_consumer(consumer_number, |record| {
            let evaluation = evaluate_overdue_and_fine(&record.billing, &config.calendar, &config.fine, now);
            let events = evaluation_events(consumer_number, &evaluation, now);
            record.billing = evaluation.state;
            Ok((BillSummary::build(record, config, now), events))
        })
    }

    /// Persisted fine evaluation for one consumer.
    pub fn evaluate_consumer(&mut self, consumer_number: &str, now: DateTime<Utc>) -> BillingResult<FineOutcome> {
        let config = &self.config;
        self.store.with_consumer(consumer_number, |record| {
            let evaluation = evaluate_overdue_and_fine(&record.billing, &config.calendar, &config.fine, now);
            let events = evaluation_events(consumer_number, &evaluation, now);
            record.billing = evaluation.state;
            Ok((evaluation.outcome, events))
        })
    }

    pub fn mark_paid(&mut self, consumer_number: &str, now: DateTime<Utc>) -> BillingResult<PaymentReceipt> {
        self.store.with_consumer(consumer_number, |record| {
            let fine_included = record.billing.is_fine_applied;
            let settlement = settle_payment(&record.billing, now);
            record.billing = settlement.state;
            let receipt = PaymentReceipt {
                consumer_number: consumer_number.to_string(),
                paid_amount: settlement.paid_amount,
                fine_included,
                paid_at: now,
                settled: settlement.settled,
            };
            if !settlement.settled {
                log::debug!("billing: consumer={consumer_number} has nothing to pay");
                return Ok((receipt, Vec::new()));
            }
            log::info!(
                "billing: consumer={consumer_number} paid {:.2}{}",
                settlement.paid_amount,
                if fine_included { " (fine included)" } else { "" }
            );
            let event = BillingEvent::PaymentSettled {
                at: now,
                consumer_number: consumer_number.to_string(),
                paid_amount: settlement.paid_amount,
                fine_included,
            };
            Ok((receipt, vec![event]))
        })
    }

    // ── Sweeps ─────────────────────────────────────────────────

    /// Apply fines to every overdue, unpaid consumer; return all consumers
    /// carrying a fine afterwards.
    pub fn sweep_overdue_fines(&mut self, now: DateTime<Utc>) -> BillingResult<Vec<FinedConsumer>> {
        let mut fined = Vec::new();
        for number in self.store.unpaid_consumer_numbers()? {
            let config = &self.config;
            let entry = self.store.with_consumer(&number, |record| {
                let evaluation = evaluate_overdue_and_fine(&record.billing, &config.calendar, &config.fine, now);
                let events = evaluation_events(&number, &evaluation, now);
                let newly_fined = evaluation.newly_fined();
                record.billing = evaluation.state;
                let entry = record.billing.is_fine_applied.then(|| FinedConsumer {
                    consumer_number:   number.clone(),
                    name:              record.profile.name.clone(),
                    tariff_plan:       record.billing.tariff_plan.clone(),
                    amount:            record.billing.amount,
                    fine:              record.billing.fine,
                    fine_applied_date: record.billing.fine_applied_date,
                    payment_status:    record.billing.payment_status,
                    newly_fined,
                });
                Ok((entry, events))
            });
            match entry {
                Ok(Some(e)) => fined.push(e),
                Ok(None) => {}
                // Deleted between listing and processing.
                Err(BillingError::ConsumerNotFound { .. }) => {}
                Err(e) => {
                    log::warn!("billing: fine sweep stopped at consumer={number}: {e}");
                    return Err(e);
                }
            }
        }
        log::debug!("billing: fine sweep found {} fined consumers", fined.len());
        Ok(fined)
    }

    /// Consumers with no reading anywhere in the current cycle once its
    /// reading window has closed. Read-only.
    pub fn consumers_with_missed_readings(&self, now: DateTime<Utc>) -> BillingResult<Vec<MissedReading>> {
        let today = now.date_naive();
        let windows = self.config.calendar.resolve(today);
        if today <= windows.reading_end {
            return Ok(Vec::new());
        }

        let missed = self
            .store
            .all_consumers()?
            .into_iter()
            .filter(|r| !has_reading_in_cycle(&r.billing, &self.config.calendar, today))
            .map(|r| MissedReading {
                consumer_number:      r.profile.consumer_number,
                name:                 r.profile.name,
                meter_serial_number:  r.profile.meter_serial_number,
                last_bill_date:       r.billing.last_bill_date,
                reading_window_start: windows.reading_start,
                reading_window_end:   windows.reading_end,
            })
            .collect();
        Ok(missed)
    }

    /// Issue each warning / urgent / overdue reminder once per bill.
    pub fn dispatch_reminders(&mut self, now: DateTime<Utc>) -> BillingResult<Vec<IssuedReminder>> {
        let mut issued = Vec::new();
        for number in self.store.unpaid_consumer_numbers()? {
            let config = &self.config;
            let result = self.store.with_consumer(&number, |record| {
                let evaluation = evaluate_overdue_and_fine(&record.billing, &config.calendar, &config.fine, now);
                let mut events = evaluation_events(&number, &evaluation, now);
                record.billing = evaluation.state;

                let reminder = classify_reminder(&record.billing, &config.calendar, now);
                if !mark_reminder_sent(&mut record.billing, reminder.kind) {
                    return Ok((None, events));
                }
                events.push(BillingEvent::ReminderIssued {
                    at: now,
                    consumer_number: number.clone(),
                    kind: reminder.kind,
                    days_until_deadline: reminder.days_until_deadline,
                });
                Ok((Some(reminder), events))
            });
            match result {
                Ok(Some(reminder)) => {
                    log::info!("billing: consumer={number} reminder '{}' issued", reminder.kind.as_str());
                    issued.push(IssuedReminder { consumer_number: number, reminder });
                }
                Ok(None) => {}
                Err(BillingError::ConsumerNotFound { .. }) => {}
                Err(e) => {
                    log::warn!("billing: reminder dispatch stopped at consumer={number}: {e}");
                    return Err(e);
                }
            }
        }
        Ok(issued)
    }
}

fn evaluation_events(consumer_number: &str, evaluation: &FineEvaluation, now: DateTime<Utc>) -> Vec<BillingEvent> {
    match evaluation.outcome {
        FineOutcome::Applied { fine } => {
            log::info!(
                "billing: consumer={consumer_number} overdue, fine {:.2} applied",
                fine.total_fine_with_tax
            );
            vec![BillingEvent::FineApplied {
                at: now,
                consumer_number: consumer_number.to_string(),
                fine,
                deadline: evaluation.state.next_payment_deadline,
            }]
        }
        FineOutcome::ZeroBalanceSettled => {
            log::debug!("billing: consumer={consumer_number} zero-balance bill marked Paid");
            vec![BillingEvent::ZeroBalanceSettled {
                at: now,
                consumer_number: consumer_number.to_string(),
            }]
        }
        FineOutcome::NotDue | FineOutcome::AlreadyApplied => Vec::new(),
    }
}
