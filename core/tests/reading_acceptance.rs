//! Reading acceptance policy tests.

use chrono::{DateTime, TimeZone, Utc};
use gridbill_core::{
    config::TariffTable,
    consumer::{BillingState, FineDetails, PaymentStatus, ReadingEntry},
    cycle::CycleCalendar,
    error::BillingError,
    reading::{try_accept_reading, ReadingSubmission},
};

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn state(plan: &str, reading: f64) -> BillingState {
    BillingState::new(plan, reading)
}

fn accept(
    s: &BillingState,
    submission: &ReadingSubmission,
) -> Result<gridbill_core::reading::AcceptedReading, BillingError> {
    try_accept_reading(s, submission, &CycleCalendar::default(), &TariffTable::default())
}

/// Day 20 is outside the day 1–15 reading window.
#[test]
fn reading_on_day_twenty_is_rejected() {
    let s = state("domestic", 1000.0);
    let err = accept(&s, &ReadingSubmission::cumulative(at(2024, 1, 20, 9), 1100.0)).unwrap_err();
    match err {
        BillingError::OutsideReadingWindow { window_end, .. } => {
            assert_eq!(window_end.to_string(), "2024-01-15");
        }
        other => panic!("expected OutsideReadingWindow, got {other:?}"),
    }
}

/// An accepted reading bills the difference at the plan rate and sets the
/// deadline to the start of day 30.
#[test]
fn accepted_reading_bills_difference_and_sets_deadline() {
    let s = state("domestic", 1000.0);
    let accepted = accept(&s, &ReadingSubmission::cumulative(at(2024, 1, 10, 15), 1100.0)).unwrap();

    assert_eq!(accepted.units_consumed, 100.0);
    assert_eq!(accepted.rate, 5.0);
    assert_eq!(accepted.amount, 500.0);

    let next = accepted.state;
    assert_eq!(next.current_reading, 1100.0);
    assert_eq!(next.amount, 500.0);
    assert_eq!(next.payment_status, PaymentStatus::Pending);
    assert_eq!(next.last_bill_date, Some(at(2024, 1, 10, 15)));
    assert_eq!(next.next_payment_deadline, Some(at(2024, 1, 30, 0)));
    assert_eq!(next.readings.len(), 1);
    assert_eq!(next.readings[0].units, 100.0);
    assert_eq!(next.readings[0].manual_reading, 1100.0);
}

/// Only one reading per cycle window.
#[test]
fn second_reading_in_same_window_is_rejected() {
    let s = state("domestic", 1000.0);
    let first = accept(&s, &ReadingSubmission::cumulative(at(2024, 1, 5, 10), 1050.0)).unwrap();
    let err = accept(&first.state, &ReadingSubmission::cumulative(at(2024, 1, 12, 10), 1090.0)).unwrap_err();
    assert!(matches!(err, BillingError::DuplicateReadingThisCycle { .. }));
}

/// A reading dated before the last bill is rejected, even when its own
/// window holds no reading yet.
#[test]
fn backdated_reading_is_rejected() {
    let s = state("domestic", 1000.0);
    let march = accept(&s, &ReadingSubmission::cumulative(at(2024, 3, 5, 10), 1050.0)).unwrap();
    let err = accept(&march.state, &ReadingSubmission::cumulative(at(2024, 1, 5, 10), 1090.0)).unwrap_err();
    assert_eq!(err.kind(), "backdated_reading");
    match err {
        BillingError::BackdatedReading { reading_date, last_bill_date } => {
            assert_eq!(reading_date.to_string(), "2024-01-05");
            assert_eq!(last_bill_date.to_string(), "2024-03-05");
        }
        other => panic!("expected BackdatedReading, got {other:?}"),
    }
}

/// The one-reading rule consults the whole history, so an earlier entry in
/// the window blocks a new reading even when the last bill lies elsewhere.
#[test]
fn reading_history_blocks_second_reading_in_window() {
    let mut s = state("domestic", 1200.0);
    s.readings = vec![
        ReadingEntry { date: at(2024, 1, 4, 9), units: 50.0, manual_reading: 1050.0 },
        ReadingEntry { date: at(2024, 3, 6, 9), units: 100.0, manual_reading: 1150.0 },
        ReadingEntry { date: at(2024, 1, 2, 9), units: 50.0, manual_reading: 1200.0 },
    ];
    s.last_bill_date = Some(at(2024, 1, 2, 9));

    let err = accept(&s, &ReadingSubmission::cumulative(at(2024, 3, 10, 10), 1300.0)).unwrap_err();
    match err {
        BillingError::DuplicateReadingThisCycle { last_bill_date, window_start, .. } => {
            assert_eq!(last_bill_date.to_string(), "2024-03-06");
            assert_eq!(window_start.to_string(), "2024-03-01");
        }
        other => panic!("expected DuplicateReadingThisCycle, got {other:?}"),
    }

    // The next cycle's window holds nothing yet.
    let accepted = accept(&s, &ReadingSubmission::cumulative(at(2024, 5, 1, 10), 1300.0)).unwrap();
    assert_eq!(accepted.state.readings.len(), 4);
}

/// A reading in the previous cycle does not block the next one.
#[test]
fn reading_in_next_cycle_is_accepted() {
    let s = state("commercial", 1000.0);
    let first = accept(&s, &ReadingSubmission::cumulative(at(2024, 1, 5, 10), 1050.0)).unwrap();
    let second = accept(&first.state, &ReadingSubmission::cumulative(at(2024, 3, 1, 10), 1080.0)).unwrap();
    assert_eq!(second.amount, 300.0);
    assert_eq!(second.state.next_payment_deadline, Some(at(2024, 3, 30, 0)));
    assert_eq!(second.state.readings.len(), 2);
}

/// Equal or lower cumulative readings are rejected.
#[test]
fn non_increasing_reading_is_rejected() {
    let s = state("domestic", 1000.0);
    for submitted in [1000.0, 999.0] {
        let err = accept(&s, &ReadingSubmission::cumulative(at(2024, 1, 5, 10), submitted)).unwrap_err();
        match err {
            BillingError::NonIncreasingReading { previous, submitted: got } => {
                assert_eq!(previous, 1000.0);
                assert_eq!(got, submitted);
            }
            other => panic!("expected NonIncreasingReading, got {other:?}"),
        }
    }
}

/// Plan names are matched case-insensitively; unknown plans are fatal.
#[test]
fn tariff_lookup_is_case_insensitive_and_strict() {
    let s = state("Industrial", 0.0);
    let accepted = accept(&s, &ReadingSubmission::cumulative(at(2024, 1, 2, 8), 10.0)).unwrap();
    assert_eq!(accepted.amount, 150.0);

    let bad = state("agricultural", 0.0);
    let err = accept(&bad, &ReadingSubmission::cumulative(at(2024, 1, 2, 8), 10.0)).unwrap_err();
    assert!(matches!(err, BillingError::InvalidTariffPlan { .. }));
}

/// A units-only submission derives the new cumulative reading.
#[test]
fn units_only_submission_derives_reading() {
    let s = state("domestic", 250.0);
    let accepted = accept(&s, &ReadingSubmission::units(at(2024, 1, 3, 8), 120.0)).unwrap();
    assert_eq!(accepted.state.current_reading, 370.0);
    assert_eq!(accepted.units_consumed, 120.0);
    assert_eq!(accepted.amount, 600.0);
}

/// Admin override bypasses window, duplicate and monotonic checks.
#[test]
fn admin_override_bypasses_checks() {
    let s = state("domestic", 1000.0);
    let first = accept(&s, &ReadingSubmission::cumulative(at(2024, 1, 5, 10), 1050.0)).unwrap();

    let late = ReadingSubmission::cumulative(at(2024, 1, 20, 10), 1100.0).with_override();
    let accepted = accept(&first.state, &late).unwrap();
    assert_eq!(accepted.units_consumed, 50.0);
    assert_eq!(accepted.state.readings.len(), 2);
}

/// Under override, explicit non-negative units are trusted; otherwise the
/// difference is used and clamped at zero.
#[test]
fn override_units_trusted_or_clamped() {
    let s = state("domestic", 1000.0);

    let trusted = ReadingSubmission {
        reading_date: at(2024, 1, 25, 10),
        current_reading: Some(900.0),
        units_consumed: Some(50.0),
        admin_override: true,
    };
    let accepted = accept(&s, &trusted).unwrap();
    assert_eq!(accepted.units_consumed, 50.0);
    assert_eq!(accepted.amount, 250.0);
    assert_eq!(accepted.state.current_reading, 900.0);

    let clamped = ReadingSubmission { units_consumed: Some(-5.0), ..trusted };
    let accepted = accept(&s, &clamped).unwrap();
    assert_eq!(accepted.units_consumed, 0.0);
    assert_eq!(accepted.amount, 0.0);
}

/// Override units may not drive the derived meter value below zero.
#[test]
fn override_units_cannot_make_reading_negative() {
    let s = state("domestic", 10.0);
    let submission = ReadingSubmission::units(at(2024, 1, 20, 10), -50.0).with_override();
    let err = accept(&s, &submission).unwrap_err();
    match err {
        BillingError::InvalidReadingInput { reason } => assert!(reason.contains("-40")),
        other => panic!("expected InvalidReadingInput, got {other:?}"),
    }
}

/// A new reading clears an earlier fine and its reminders.
#[test]
fn accepted_reading_resets_fine_fields() {
    let mut s = state("domestic", 1000.0);
    s.payment_status = PaymentStatus::Overdue;
    s.is_fine_applied = true;
    s.fine = FineDetails { fine_amount: 100.0, cgst_on_fine: 9.0, sgst_on_fine: 9.0, total_fine_with_tax: 118.0 };
    s.fine_applied_date = Some(at(2024, 2, 1, 0));
    s.reminders.overdue_reminder_sent = true;

    let next = accept(&s, &ReadingSubmission::cumulative(at(2024, 3, 2, 10), 1010.0)).unwrap().state;
    assert!(!next.is_fine_applied);
    assert_eq!(next.fine, FineDetails::default());
    assert_eq!(next.fine_applied_date, None);
    assert!(!next.reminders.overdue_reminder_sent);
    assert_eq!(next.payment_status, PaymentStatus::Pending);
}

/// Malformed submissions fail before any policy check.
#[test]
fn malformed_submission_is_rejected() {
    let s = state("domestic", 0.0);
    let empty = ReadingSubmission {
        reading_date: at(2024, 1, 20, 10),
        current_reading: None,
        units_consumed: None,
        admin_override: false,
    };
    let err = accept(&s, &empty).unwrap_err();
    assert!(matches!(err, BillingError::InvalidReadingInput { .. }));

    let nan = ReadingSubmission::units(at(2024, 1, 2, 10), f64::NAN);
    assert!(matches!(accept(&s, &nan).unwrap_err(), BillingError::InvalidReadingInput { .. }));
}
