//! Fine & overdue evaluator.
//!
//! RULE: a fine is applied at most once per outstanding bill. Once
//! `is_fine_applied` is set, re-evaluation leaves every fine field and
//! `fine_applied_date` untouched until a payment or a new reading clears it.

use crate::{
    config::FinePolicy,
    consumer::{BillingState, FineDetails, PaymentStatus},
    cycle::CycleCalendar,
    types::{round2, Money},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

impl FinePolicy {
    /// Each tax component is rounded on its own; the total is the
    /// rounded sum of the rounded parts.
    pub fn compute(&self) -> FineDetails {
        let fine_amount = round2(self.base_fine);
        let cgst_on_fine = round2(self.base_fine * self.cgst_rate);
        let sgst_on_fine = round2(self.base_fine * self.sgst_rate);
        FineDetails {
            fine_amount,
            cgst_on_fine,
            sgst_on_fine,
            total_fine_with_tax: round2(fine_amount + cgst_on_fine + sgst_on_fine),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FineOutcome {
    /// Nothing owed or deadline not yet passed.
    NotDue,
    /// Pending bill with a zero amount was settled as Paid.
    ZeroBalanceSettled,
    /// Overdue and fined during this evaluation.
    Applied { fine: FineDetails },
    /// Overdue and fined earlier; left as is.
    AlreadyApplied,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FineEvaluation {
    pub state:   BillingState,
    pub outcome: FineOutcome,
}

impl FineEvaluation {
    pub fn newly_fined(&self) -> bool {
        matches!(self.outcome, FineOutcome::Applied { .. })
    }
}

/// Strictly past the deadline with something still owed.
pub fn is_overdue(state: &BillingState, now: DateTime<Utc>) -> bool {
    match state.next_payment_deadline {
        Some(deadline) => {
            now > deadline
                && state.payment_status != PaymentStatus::Paid
                && !state.is_zero_balance_pending()
        }
        None => false,
    }
}

/// Pending with nothing owed becomes Paid with no deadline. None when the
/// state does not qualify.
pub fn settle_zero_balance(state: &BillingState) -> Option<FineEvaluation> {
    if !state.is_zero_balance_pending() {
        return None;
    }
    let mut next = state.clone();
    next.payment_status = PaymentStatus::Paid;
    next.next_payment_deadline = None;
    next.clear_fine();
    Some(FineEvaluation { state: next, outcome: FineOutcome::ZeroBalanceSettled })
}

pub fn evaluate_overdue_and_fine(
    state: &BillingState,
    calendar: &CycleCalendar,
    policy: &FinePolicy,
    now: DateTime<Utc>,
) -> FineEvaluation {
    if let Some(settled) = settle_zero_balance(state) {
        return settled;
    }
    let mut next = state.clone();

    if next.payment_status != PaymentStatus::Paid {
        if let Some(bill_date) = next.last_bill_date {
            next.next_payment_deadline = Some(calendar.resolve_at(bill_date).payment_deadline());
        }
    }

    if !is_overdue(&next, now) {
        return FineEvaluation { state: next, outcome: FineOutcome::NotDue };
    }

    if next.is_fine_applied {
        return FineEvaluation { state: next, outcome: FineOutcome::AlreadyApplied };
    }

    let fine = policy.compute();
    next.fine = fine;
    next.is_fine_applied = true;
    next.fine_applied_date = Some(now);
    next.payment_status = PaymentStatus::Overdue;

    FineEvaluation { state: next, outcome: FineOutcome::Applied { fine } }
}

/// Bill amount plus the fine when the bill is overdue and fined.
pub fn total_amount_due(state: &BillingState, now: DateTime<Utc>) -> Money {
    if state.is_fine_applied && is_overdue(state, now) {
        round2(state.amount + state.fine.total_fine_with_tax)
    } else {
        round2(state.amount)
    }
}
