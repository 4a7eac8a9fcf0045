//! Fine & overdue evaluator tests.

use chrono::{DateTime, TimeZone, Utc};
use gridbill_core::{
    config::{FinePolicy, TariffTable},
    consumer::{BillingState, PaymentStatus},
    cycle::CycleCalendar,
    fine::{evaluate_overdue_and_fine, is_overdue, total_amount_due, FineOutcome},
    reading::{try_accept_reading, ReadingSubmission},
};

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// 100 units on the domestic plan, read on 2024-01-10: 500.00 due at
/// 2024-01-30 00:00 UTC.
fn billed_state() -> BillingState {
    let s = BillingState::new("domestic", 1000.0);
    try_accept_reading(
        &s,
        &ReadingSubmission::cumulative(at(2024, 1, 10, 15), 1100.0),
        &CycleCalendar::default(),
        &TariffTable::default(),
    )
    .unwrap()
    .state
}

fn evaluate(state: &BillingState, now: DateTime<Utc>) -> gridbill_core::fine::FineEvaluation {
    evaluate_overdue_and_fine(state, &CycleCalendar::default(), &FinePolicy::default(), now)
}

/// Base 100 with 9% CGST and 9% SGST.
#[test]
fn fine_breakdown_is_118() {
    let fine = FinePolicy::default().compute();
    assert_eq!(fine.fine_amount, 100.0);
    assert_eq!(fine.cgst_on_fine, 9.0);
    assert_eq!(fine.sgst_on_fine, 9.0);
    assert_eq!(fine.total_fine_with_tax, 118.0);
}

/// Tax components are rounded individually before summing.
#[test]
fn fine_components_round_to_cents() {
    let policy = FinePolicy { base_fine: 33.33, cgst_rate: 0.09, sgst_rate: 0.09 };
    let fine = policy.compute();
    assert_eq!(fine.cgst_on_fine, 3.0);
    assert_eq!(fine.sgst_on_fine, 3.0);
    assert_eq!(fine.total_fine_with_tax, 39.33);
}

/// The deadline instant itself is not overdue; one second later is.
#[test]
fn overdue_is_strictly_after_deadline() {
    let s = billed_state();
    assert!(!is_overdue(&s, at(2024, 1, 30, 0)));
    assert!(is_overdue(&s, at(2024, 1, 30, 0) + chrono::Duration::seconds(1)));

    let before = evaluate(&s, at(2024, 1, 29, 23));
    assert_eq!(before.outcome, FineOutcome::NotDue);
    assert_eq!(before.state, s);
}

/// First evaluation past the deadline fines; the second is a no-op.
#[test]
fn fine_is_applied_once() {
    let s = billed_state();
    let now = at(2024, 2, 2, 9);

    let first = evaluate(&s, now);
    assert!(first.newly_fined());
    assert_eq!(first.state.payment_status, PaymentStatus::Overdue);
    assert!(first.state.is_fine_applied);
    assert_eq!(first.state.fine.total_fine_with_tax, 118.0);
    assert_eq!(first.state.fine_applied_date, Some(now));

    let second = evaluate(&first.state, now);
    assert_eq!(second.outcome, FineOutcome::AlreadyApplied);
    assert_eq!(second.state, first.state);

    let later = evaluate(&first.state, at(2024, 2, 20, 9));
    assert_eq!(later.outcome, FineOutcome::AlreadyApplied);
    assert_eq!(later.state.fine_applied_date, Some(now));
}

/// A Pending bill of zero is settled as Paid and never becomes overdue.
#[test]
fn zero_amount_pending_is_never_overdue() {
    let mut s = BillingState::new("domestic", 0.0);
    s.next_payment_deadline = Some(at(2024, 1, 30, 0));
    let now = at(2024, 2, 10, 0);
    assert!(!is_overdue(&s, now));

    let evaluation = evaluate(&s, now);
    assert_eq!(evaluation.outcome, FineOutcome::ZeroBalanceSettled);
    assert_eq!(evaluation.state.payment_status, PaymentStatus::Paid);
    assert_eq!(evaluation.state.next_payment_deadline, None);
    assert!(!evaluation.state.is_fine_applied);

    let again = evaluate(&evaluation.state, now);
    assert_eq!(again.outcome, FineOutcome::NotDue);
}

/// Paid bills are never fined, even with a stale deadline.
#[test]
fn paid_bill_is_not_fined() {
    let mut s = billed_state();
    s.payment_status = PaymentStatus::Paid;
    let evaluation = evaluate(&s, at(2024, 2, 10, 0));
    assert_eq!(evaluation.outcome, FineOutcome::NotDue);
    assert!(!evaluation.state.is_fine_applied);
}

/// An outstanding deadline that disagrees with the reading date is
/// reconciled before the overdue check.
#[test]
fn stale_deadline_is_reconciled_from_bill_date() {
    let mut s = billed_state();
    s.next_payment_deadline = Some(at(2024, 2, 15, 0));
    let evaluation = evaluate(&s, at(2024, 2, 1, 12));
    assert_eq!(evaluation.state.next_payment_deadline, Some(at(2024, 1, 30, 0)));
    assert!(evaluation.newly_fined());
}

/// Total due adds the taxed fine only once the bill is overdue and fined.
#[test]
fn total_due_includes_fine_when_overdue() {
    let s = billed_state();
    assert_eq!(total_amount_due(&s, at(2024, 1, 20, 0)), 500.0);

    let fined = evaluate(&s, at(2024, 2, 1, 0)).state;
    assert_eq!(total_amount_due(&fined, at(2024, 2, 1, 0)), 618.0);
}
