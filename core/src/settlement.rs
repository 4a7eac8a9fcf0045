//! Payment settlement.

use crate::{
    consumer::{BillingState, PaymentStatus, ReminderFlags},
    types::{round2, Money},
};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub state:       BillingState,
    pub paid_amount: Money,
    /// False when the consumer was already paid up and nothing changed.
    pub settled:     bool,
}

/// Settle the outstanding bill, fine included. No new deadline is set
/// until the next accepted reading.
///
/// A consumer already marked Paid with nothing owed is returned unchanged,
/// so `last_payment_date` and `last_paid_amount` keep the real payment.
pub fn settle_payment(state: &BillingState, now: DateTime<Utc>) -> Settlement {
    let fine_due = if state.is_fine_applied { state.fine.total_fine_with_tax } else { 0.0 };
    let paid_amount = round2(state.amount + fine_due);

    if paid_amount == 0.0 && state.payment_status == PaymentStatus::Paid {
        return Settlement { state: state.clone(), paid_amount, settled: false };
    }

    let mut next = state.clone();
    next.last_paid_amount = paid_amount;
    next.amount = 0.0;
    next.payment_status = PaymentStatus::Paid;
    next.last_payment_date = Some(now);
    next.clear_fine();
    next.reminders = ReminderFlags::default();
    next.next_payment_deadline = None;

    Settlement { state: next, paid_amount, settled: true }
}
