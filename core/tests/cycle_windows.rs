//! Cycle window resolver tests.

use chrono::{Duration, NaiveDate};
use gridbill_core::cycle::{resolve_cycle, CycleCalendar, CyclePhase};

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Every day of a cycle resolves to the same cycle start, before and after
/// the epoch.
#[test]
fn dates_in_one_cycle_share_a_start() {
    for cycle_start in [ymd(2024, 1, 1), ymd(2024, 3, 1), ymd(2023, 11, 2)] {
        let expected = resolve_cycle(cycle_start);
        assert_eq!(expected.cycle_start, cycle_start);
        for offset in 0..60 {
            let d = cycle_start + Duration::days(offset);
            assert_eq!(
                resolve_cycle(d).cycle_start,
                cycle_start,
                "{d} should belong to the cycle starting {cycle_start}"
            );
        }
        let next = cycle_start + Duration::days(60);
        assert_eq!(resolve_cycle(next).cycle_index, expected.cycle_index + 1);
    }
}

/// Reading (15 days) + payment (15 days) + idle (30 days) cover exactly
/// 60 consecutive, non-overlapping days.
#[test]
fn windows_partition_sixty_days() {
    let mut d = ymd(2022, 6, 1);
    while d < ymd(2026, 6, 1) {
        let w = resolve_cycle(d);
        assert_eq!((w.reading_end - w.reading_start).num_days() + 1, 15);
        assert_eq!(w.payment_start, w.reading_end + Duration::days(1));
        assert_eq!((w.payment_end - w.payment_start).num_days() + 1, 15);
        let idle_start = w.payment_end + Duration::days(1);
        assert_eq!((w.idle_end - idle_start).num_days() + 1, 30);
        assert_eq!(resolve_cycle(w.idle_end + Duration::days(1)).cycle_start, w.idle_end + Duration::days(1));
        d += Duration::days(17);
    }
}

/// The example from the billing rules: 2024-01-20 is day 20, a payment day.
#[test]
fn day_twenty_is_in_the_payment_window() {
    let w = resolve_cycle(ymd(2024, 1, 20));
    assert_eq!(w.cycle_start, ymd(2024, 1, 1));
    assert_eq!(w.reading_end, ymd(2024, 1, 15));
    assert_eq!(w.phase_of(ymd(2024, 1, 20)), Some(CyclePhase::Payment));
    assert_eq!(w.phase_of(ymd(2024, 1, 15)), Some(CyclePhase::Reading));
    assert_eq!(w.phase_of(ymd(2024, 1, 31)), Some(CyclePhase::Idle));
    assert_eq!(w.phase_of(ymd(2024, 3, 1)), None);
}

/// Leap day 2024-02-29 is the last idle day of cycle 0; cycle 1 opens on
/// 2024-03-01.
#[test]
fn leap_day_closes_cycle_zero() {
    let w = resolve_cycle(ymd(2024, 2, 29));
    assert_eq!(w.cycle_index, 0);
    assert_eq!(w.idle_end, ymd(2024, 2, 29));
    assert_eq!(resolve_cycle(ymd(2024, 3, 1)).cycle_index, 1);
}

/// Dates before the epoch land in negative cycles and still contain
/// themselves.
#[test]
fn pre_epoch_dates_resolve_consistently() {
    let mut d = ymd(2023, 1, 1);
    while d < ymd(2024, 1, 1) {
        let w = resolve_cycle(d);
        assert!(w.cycle_index < 0, "{d} should be before cycle 0");
        assert!(w.contains(d));
        d += Duration::days(1);
    }
}

/// The epoch is injected; a different anchor shifts every window.
#[test]
fn custom_epoch_shifts_windows() {
    let calendar = CycleCalendar::new(ymd(2025, 5, 10));
    let w = calendar.resolve(ymd(2025, 5, 24));
    assert_eq!(w.cycle_index, 0);
    assert_eq!(w.reading_end, ymd(2025, 5, 24));
    assert!(w.in_reading_window(ymd(2025, 5, 24)));
    assert!(!w.in_reading_window(ymd(2025, 5, 25)));
    assert_eq!(w.payment_deadline().date_naive(), ymd(2025, 6, 8));
}

/// The reading window closes at the end of its last day, not its start.
#[test]
fn reading_deadline_is_end_of_last_window_day() {
    let w = resolve_cycle(ymd(2024, 1, 7));
    let closes = w.reading_deadline();
    assert_eq!(closes.date_naive(), ymd(2024, 1, 16));
    assert_eq!(closes.time(), chrono::NaiveTime::MIN);
    assert!(w.in_reading_window((closes - Duration::seconds(1)).date_naive()));
    assert!(!w.in_reading_window(closes.date_naive()));
}
