//! Reading acceptance policy.
//!
//! CHECK ORDER (first failure wins):
//!   1. input shape
//!   2. reading window       (skipped under admin override)
//!   3. not before last bill (skipped under admin override)
//!   4. one reading / window (skipped under admin override)
//!   5. non-negative meter
//!   6. monotonic meter      (skipped under admin override)
//!   7. tariff plan
//!
//! The one-reading check looks at the whole reading history, not only the
//! latest bill date.
//!
//! The deadline rule is the same for every submission path: the payment
//! deadline of the cycle that contains the reading date.

use crate::{
    config::TariffTable,
    consumer::{BillingState, PaymentStatus, ReadingEntry, ReminderFlags},
    cycle::CycleCalendar,
    error::{BillingError, BillingResult},
    types::{round2, Money, Units},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingSubmission {
    pub reading_date:    DateTime<Utc>,
    /// New cumulative meter value. Takes precedence over `units_consumed`
    /// when deriving the new reading.
    #[serde(default)]
    pub current_reading: Option<Units>,
    #[serde(default)]
    pub units_consumed:  Option<Units>,
    #[serde(default)]
    pub admin_override:  bool,
}

impl ReadingSubmission {
    /// Submission carrying a cumulative meter value.
    pub fn cumulative(reading_date: DateTime<Utc>, current_reading: Units) -> Self {
        Self {
            reading_date,
            current_reading: Some(current_reading),
            units_consumed:  None,
            admin_override:  false,
        }
    }

    /// Submission carrying only the units consumed since the last reading.
    pub fn units(reading_date: DateTime<Utc>, units_consumed: Units) -> Self {
        Self {
            reading_date,
            current_reading: None,
            units_consumed:  Some(units_consumed),
            admin_override:  false,
        }
    }

    pub fn with_override(mut self) -> Self {
        self.admin_override = true;
        self
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedReading {
    pub state:          BillingState,
    pub units_consumed: Units,
    pub amount:         Money,
    pub rate:           Money,
}

pub fn try_accept_reading(
    state: &BillingState,
    submission: &ReadingSubmission,
    calendar: &CycleCalendar,
    tariffs: &TariffTable,
) -> BillingResult<AcceptedReading> {
    validate_input(submission)?;

    let reading_day = submission.reading_date.date_naive();
    let windows = calendar.resolve(reading_day);
    let is_override = submission.admin_override;

    if !is_override && !windows.in_reading_window(reading_day) {
        return Err(BillingError::OutsideReadingWindow {
            reading_date: reading_day,
            window_start: windows.reading_start,
            window_end:   windows.reading_end,
        });
    }

    if !is_override {
        if let Some(last_bill_date) = state.last_bill_date {
            if submission.reading_date < last_bill_date {
                return Err(BillingError::BackdatedReading {
                    reading_date:   reading_day,
                    last_bill_date: last_bill_date.date_naive(),
                });
            }
        }
        if let Some(recorded_day) = reading_day_in_window(state, calendar, reading_day) {
            return Err(BillingError::DuplicateReadingThisCycle {
                last_bill_date: recorded_day,
                window_start:   windows.reading_start,
                window_end:     windows.reading_end,
            });
        }
    }

    let previous = state.current_reading;
    let new_reading = match submission.current_reading {
        Some(reading) => reading,
        None => previous + submission.units_consumed.unwrap_or(0.0),
    };

    if new_reading < 0.0 {
        return Err(BillingError::InvalidReadingInput {
            reason: format!("derived meter reading {new_reading} must not be negative"),
        });
    }

    if !is_override && new_reading <= previous {
        return Err(BillingError::NonIncreasingReading {
            previous,
            submitted: new_reading,
        });
    }

    let units_consumed = match submission.units_consumed {
        Some(units) if is_override && units >= 0.0 => units,
        _ => (new_reading - previous).max(0.0),
    };

    let rate = tariffs.rate_for(&state.tariff_plan)?;
    let amount = round2(units_consumed * rate);

    let mut next = state.clone();
    next.current_reading = new_reading;
    next.amount = amount;
    next.last_bill_date = Some(submission.reading_date);
    next.next_payment_deadline = Some(windows.payment_deadline());
    next.payment_status = PaymentStatus::Pending;
    next.clear_fine();
    next.reminders = ReminderFlags::default();
    next.readings.push(ReadingEntry {
        date:           submission.reading_date,
        units:          units_consumed,
        manual_reading: new_reading,
    });

    Ok(AcceptedReading {
        state: next,
        units_consumed,
        amount,
        rate,
    })
}

/// Whether `state` already holds a reading inside the reading window of
/// the cycle containing `day`.
pub fn has_reading_in_window(state: &BillingState, calendar: &CycleCalendar, day: NaiveDate) -> bool {
    reading_day_in_window(state, calendar, day).is_some()
}

/// Whether `state` holds a reading anywhere in the cycle containing `day`.
pub fn has_reading_in_cycle(state: &BillingState, calendar: &CycleCalendar, day: NaiveDate) -> bool {
    let windows = calendar.resolve(day);
    recorded_reading_days(state).any(|d| windows.contains(d))
}

// History entries plus `last_bill_date`, which may predate the history.
fn recorded_reading_days(state: &BillingState) -> impl Iterator<Item = NaiveDate> + '_ {
    state
        .readings
        .iter()
        .map(|r| r.date.date_naive())
        .chain(state.last_bill_date.map(|d| d.date_naive()))
}

fn reading_day_in_window(
    state: &BillingState,
    calendar: &CycleCalendar,
    day: NaiveDate,
) -> Option<NaiveDate> {
    let windows = calendar.resolve(day);
    recorded_reading_days(state)
        .filter(|d| windows.in_reading_window(*d))
        .max()
}

fn validate_input(submission: &ReadingSubmission) -> BillingResult<()> {
    let invalid = |reason: &str| {
        Err(BillingError::InvalidReadingInput { reason: reason.to_string() })
    };

    match (submission.current_reading, submission.units_consumed) {
        (None, None) => invalid("either current_reading or units_consumed is required"),
        (Some(r), _) if !r.is_finite() => invalid("current_reading must be a finite number"),
        (Some(r), _) if r < 0.0 => invalid("current_reading must not be negative"),
        (_, Some(u)) if !u.is_finite() => invalid("units_consumed must be a finite number"),
        _ => Ok(()),
    }
}
