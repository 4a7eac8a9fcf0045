//! Cycle window resolver: maps any date onto its 60-day billing cycle.
//!
//! LAYOUT (day numbers are 1-based within the cycle):
//!   days  1–15  reading window
//!   days 16–30  payment window (deadline = start of day 30)
//!   days 31–60  idle
//!
//! Cycles are anchored to a fixed epoch. Dates before the epoch fall into
//! negative cycle indices; nothing is special-cased.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub const CYCLE_LENGTH_DAYS: i64 = 60;
pub const READING_WINDOW_DAYS: i64 = 15;
pub const PAYMENT_WINDOW_DAYS: i64 = 15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Reading,
    Payment,
    Idle,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleWindows {
    pub cycle_index:   i64,
    pub cycle_start:   NaiveDate,
    pub reading_start: NaiveDate,
    pub reading_end:   NaiveDate,
    pub payment_start: NaiveDate,
    pub payment_end:   NaiveDate,
    pub idle_end:      NaiveDate,
}

impl CycleWindows {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.cycle_start && date <= self.idle_end
    }

    pub fn in_reading_window(&self, date: NaiveDate) -> bool {
        date >= self.reading_start && date <= self.reading_end
    }

    pub fn in_payment_window(&self, date: NaiveDate) -> bool {
        date >= self.payment_start && date <= self.payment_end
    }

    /// Phase of `date`, or None if it belongs to another cycle.
    pub fn phase_of(&self, date: NaiveDate) -> Option<CyclePhase> {
        if self.in_reading_window(date) {
            Some(CyclePhase::Reading)
        } else if self.in_payment_window(date) {
            Some(CyclePhase::Payment)
        } else if self.contains(date) {
            Some(CyclePhase::Idle)
        } else {
            None
        }
    }

    /// Bills raised in this cycle are due at the start of `payment_end`.
    pub fn payment_deadline(&self) -> DateTime<Utc> {
        start_of_day(self.payment_end)
    }

    /// Instant the reading window closes. Readings dated any time on
    /// `reading_end` are accepted, so this is the start of `payment_start`.
    pub fn reading_deadline(&self) -> DateTime<Utc> {
        start_of_day(self.payment_start)
    }
}

/// Resolves dates to cycles relative to an injected epoch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleCalendar {
    epoch: NaiveDate,
}

impl CycleCalendar {
    pub fn new(epoch: NaiveDate) -> Self {
        Self { epoch }
    }

    pub fn epoch(&self) -> NaiveDate {
        self.epoch
    }

    pub fn resolve(&self, date: NaiveDate) -> CycleWindows {
        let days_since_epoch = date.signed_duration_since(self.epoch).num_days();
        let cycle_index = days_since_epoch.div_euclid(CYCLE_LENGTH_DAYS);
        let cycle_start = add_days(self.epoch, cycle_index * CYCLE_LENGTH_DAYS);

        CycleWindows {
            cycle_index,
            cycle_start,
            reading_start: cycle_start,
            reading_end:   add_days(cycle_start, READING_WINDOW_DAYS - 1),
            payment_start: add_days(cycle_start, READING_WINDOW_DAYS),
            payment_end:   add_days(cycle_start, READING_WINDOW_DAYS + PAYMENT_WINDOW_DAYS - 1),
            idle_end:      add_days(cycle_start, CYCLE_LENGTH_DAYS - 1),
        }
    }

    /// Time-of-day is ignored: the instant's UTC date decides the cycle.
    pub fn resolve_at(&self, at: DateTime<Utc>) -> CycleWindows {
        self.resolve(at.date_naive())
    }
}

impl Default for CycleCalendar {
    fn default() -> Self {
        Self::new(default_epoch())
    }
}

/// Resolve against the default epoch (2024-01-01).
pub fn resolve_cycle(date: NaiveDate) -> CycleWindows {
    CycleCalendar::default().resolve(date)
}

pub fn default_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN)
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

// Saturates at the ends of chrono's date range instead of panicking.
fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days)
        .and_then(|d| date.checked_add_signed(d))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn epoch_is_day_one_of_cycle_zero() {
        let w = resolve_cycle(ymd(2024, 1, 1));
        assert_eq!(w.cycle_index, 0);
        assert_eq!(w.reading_end, ymd(2024, 1, 15));
        assert_eq!(w.payment_start, ymd(2024, 1, 16));
        assert_eq!(w.payment_end, ymd(2024, 1, 30));
        assert_eq!(w.idle_end, ymd(2024, 2, 29));
    }

    #[test]
    fn day_before_epoch_is_last_day_of_cycle_minus_one() {
        let w = resolve_cycle(ymd(2023, 12, 31));
        assert_eq!(w.cycle_index, -1);
        assert_eq!(w.idle_end, ymd(2023, 12, 31));
        assert_eq!(w.cycle_start, ymd(2023, 11, 2));
    }

    #[test]
    fn extreme_dates_do_not_panic() {
        let _ = resolve_cycle(NaiveDate::MIN);
        let _ = resolve_cycle(NaiveDate::MAX);
    }
}
