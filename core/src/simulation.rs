//! Deterministic billing simulation.
//!
//! Drives a synthetic consumer population through the engine one day at a
//! time: readings in the reading window, payments (some late), reminder
//! dispatch and fine sweeps. Same seed, same start date, same params →
//! byte-identical event payloads.
//!
//! DAILY ORDER (fixed):
//!   1. readings
//!   2. payments
//!   3. reminder dispatch (evaluates fines as it goes)
//!   4. fine sweep

use crate::{
    clock::{Clock, SimClock},
    consumer::{ConsumerProfile, PaymentStatus},
    engine::BillingEngine,
    error::BillingResult,
    reading::{has_reading_in_window, ReadingSubmission},
    rng::{RngBank, SimRng, StreamSlot},
    types::{round2, Money},
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParams {
    pub consumers:                   usize,
    /// Chance per day that a consumer submits while their window is open.
    pub reading_probability_per_day: f64,
    /// Chance per day that an on-time payer pays during the payment window.
    pub payment_probability_per_day: f64,
    /// Share of the population that only pays after the deadline.
    pub late_payer_share:            f64,
    pub usage_per_cycle_min:         f64,
    pub usage_per_cycle_max:         f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            consumers:                   25,
            reading_probability_per_day: 0.35,
            payment_probability_per_day: 0.25,
            late_payer_share:            0.2,
            usage_per_cycle_min:         80.0,
            usage_per_cycle_max:         400.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SimulationStats {
    pub days_run:          u64,
    pub readings_accepted: u64,
    pub readings_rejected: u64,
    pub payments:          u64,
    pub total_billed:      Money,
    pub total_collected:   Money,
    pub fines_applied:     u64,
    pub reminders_issued:  u64,
}

struct SimConsumer {
    consumer_number: String,
    usage_per_cycle: f64,
    late_payer:      bool,
}

pub struct BillingSimulation {
    pub engine: BillingEngine,
    pub clock:  SimClock,
    pub stats:  SimulationStats,
    params:     SimulationParams,
    population: Vec<SimConsumer>,
    readings:   SimRng,
    payments:   SimRng,
}

impl BillingSimulation {
    /// Register the synthetic population and position the clock at `start`.
    pub fn new(
        mut engine: BillingEngine,
        seed: u64,
        start: NaiveDate,
        params: SimulationParams,
    ) -> BillingResult<Self> {
        let bank = RngBank::new(seed);
        let mut population_rng = bank.for_stream(StreamSlot::Population);
        let clock = SimClock::new(start, NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN));
        let plans: Vec<String> = engine
            .config
            .tariffs
            .plan_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut population = Vec::with_capacity(params.consumers);
        for i in 0..params.consumers {
            let consumer_number = format!("C{:05}", i + 1);
            let plan = population_rng
                .pick(&plans)
                .cloned()
                .unwrap_or_else(|| "domestic".to_string());
            let initial_reading = population_rng.range_f64(0.0, 5000.0).floor();
            let profile = ConsumerProfile {
                consumer_number:     consumer_number.clone(),
                meter_serial_number: format!("MTR-{:08}", population_rng.next_u64_below(100_000_000)),
                name:                format!("Consumer {}", i + 1),
                address:             format!("{} Grid Street", i + 1),
                phone_number:        format!("555-{:04}", population_rng.next_u64_below(10_000)),
            };
            engine.register_consumer(profile, &plan, initial_reading, clock.now())?;

            population.push(SimConsumer {
                consumer_number,
                usage_per_cycle: population_rng
                    .range_f64(params.usage_per_cycle_min, params.usage_per_cycle_max),
                late_payer: population_rng.chance(params.late_payer_share),
            });
        }

        log::info!(
            "simulation: seed={seed} start={start} registered {} consumers",
            population.len()
        );

        Ok(Self {
            engine,
            clock,
            stats: SimulationStats::default(),
            params,
            population,
            readings: bank.for_stream(StreamSlot::Readings),
            payments: bank.for_stream(StreamSlot::Payments),
        })
    }

    /// Run one simulated day, then advance the clock.
    pub fn step(&mut self) -> BillingResult<()> {
        let now = self.clock.now();
        let today = now.date_naive();
        let windows = self.engine.config.calendar.resolve(today);

        // 1. Readings
        if windows.in_reading_window(today) {
            for consumer in &self.population {
                let record = self.engine.consumer(&consumer.consumer_number)?;
                if has_reading_in_window(&record.billing, &self.engine.config.calendar, today) {
                    continue;
                }
                let last_day = today == windows.reading_end;
                if !last_day && !self.readings.chance(self.params.reading_probability_per_day) {
                    continue;
                }
                let units = (consumer.usage_per_cycle * self.readings.range_f64(0.8, 1.2)).round().max(1.0);
                let submission = ReadingSubmission::cumulative(now, record.billing.current_reading + units);
                match self.engine.submit_reading(&consumer.consumer_number, &submission, now) {
                    Ok(updated) => {
                        self.stats.readings_accepted += 1;
                        self.stats.total_billed = round2(self.stats.total_billed + updated.billing.amount);
                    }
                    Err(e) if e.is_rejection() => self.stats.readings_rejected += 1,
                    Err(e) => return Err(e),
                }
            }
        }

        // 2. Payments
        for consumer in &self.population {
            let record = self.engine.consumer(&consumer.consumer_number)?;
            let billing = &record.billing;
            if billing.payment_status == PaymentStatus::Paid || billing.amount <= 0.0 {
                continue;
            }
            let past_deadline = billing.next_payment_deadline.is_some_and(|d| now > d);
            let pays_today = if consumer.late_payer {
                past_deadline && self.payments.chance(self.params.payment_probability_per_day)
            } else {
                (windows.in_payment_window(today) || past_deadline)
                    && self.payments.chance(self.params.payment_probability_per_day)
            };
            if pays_today {
                let receipt = self.engine.mark_paid(&consumer.consumer_number, now)?;
                self.stats.payments += 1;
                self.stats.total_collected = round2(self.stats.total_collected + receipt.paid_amount);
            }
        }

        // 3. Reminders
        let issued = self.engine.dispatch_reminders(now)?;
        self.stats.reminders_issued += issued.len() as u64;

        // 4. Fines. Step 3 may already have fined someone, so count from the log.
        self.engine.sweep_overdue_fines(now)?;
        self.stats.fines_applied = self.engine.store.event_count("fine_applied")? as u64;

        self.stats.days_run += 1;
        self.clock.advance();
        Ok(())
    }

    pub fn run_days(&mut self, days: u64) -> BillingResult<()> {
        for _ in 0..days {
            self.step()?;
        }
        log::info!(
            "simulation: ran {} days, {} readings, {} payments, {} fines",
            self.stats.days_run,
            self.stats.readings_accepted,
            self.stats.payments,
            self.stats.fines_applied
        );
        Ok(())
    }
}
