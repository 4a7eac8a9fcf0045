//! Clocks: the only place an instant for "now" comes from.
//!
//! RULE: rule functions and the engine never read a clock. Callers read
//! one here and pass the instant down.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Simulation clock: one step = one day, always at a fixed time of day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub start:       NaiveDate,
    pub time_of_day: NaiveTime,
    pub day:         u64,
}

impl SimClock {
    pub fn new(start: NaiveDate, time_of_day: NaiveTime) -> Self {
        Self { start, time_of_day, day: 0 }
    }

    /// Step to the next day. Returns the new day number.
    pub fn advance(&mut self) -> u64 {
        self.day += 1;
        self.day
    }

    pub fn today(&self) -> NaiveDate {
        Duration::try_days(self.day as i64)
            .and_then(|d| self.start.checked_add_signed(d))
            .unwrap_or(NaiveDate::MAX)
    }
}

impl Clock for SimClock {
    fn now(&self) -> DateTime<Utc> {
        self.today().and_time(self.time_of_day).and_utc()
    }
}

/// A clock frozen at one instant (used in tests and for replaying requests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
