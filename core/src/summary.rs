//! Bill summaries: read models built from an evaluated billing state.

use crate::{
    config::{BillingConfig, FinePolicy},
    consumer::{ConsumerRecord, FineDetails, PaymentStatus},
    error::{BillingError, BillingResult},
    fine::{is_overdue, total_amount_due},
    reading::has_reading_in_window,
    reminder::{classify_reminder, days_until, reminder_message, Reminder, ReminderKind},
    types::{round2, ConsumerNumber, Money, Units},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillSummary {
    pub consumer_number:       ConsumerNumber,
    pub name:                  String,
    pub address:               String,
    pub phone_number:          String,
    pub meter_serial_number:   String,
    pub tariff_plan:           String,

    // Bill
    pub bill_amount:           Money,
    pub current_reading:       Units,
    pub last_units_consumed:   Option<Units>,
    pub tariff_rate:           Money,
    pub payment_status:        PaymentStatus,
    pub last_payment_date:     Option<DateTime<Utc>>,
    pub last_paid_amount:      Money,

    // Deadline
    pub next_payment_deadline: Option<DateTime<Utc>>,
    pub days_until_deadline:   i64,
    pub is_overdue:            bool,

    // Fine
    pub is_fine_applied:       bool,
    pub fine_details:          FineDetails,
    pub total_amount_due:      Money,

    pub reminder:              Reminder,

    // Reading window of the cycle containing `now`
    pub reading_pending:       bool,
    pub reading_window_start:  NaiveDate,
    pub reading_window_end:    NaiveDate,
}

impl BillSummary {
    /// Build from a record whose fines have already been evaluated at `now`.
    pub fn build(record: &ConsumerRecord, config: &BillingConfig, now: DateTime<Utc>) -> Self {
        let billing = &record.billing;
        let today = now.date_naive();
        let windows = config.calendar.resolve(today);
        let reading_pending = windows.in_reading_window(today)
            && !has_reading_in_window(billing, &config.calendar, today);

        Self {
            consumer_number:       record.profile.consumer_number.clone(),
            name:                  record.profile.name.clone(),
            address:               record.profile.address.clone(),
            phone_number:          record.profile.phone_number.clone(),
            meter_serial_number:   record.profile.meter_serial_number.clone(),
            tariff_plan:           billing.tariff_plan.clone(),
            bill_amount:           billing.amount,
            current_reading:       billing.current_reading,
            last_units_consumed:   billing.last_reading().map(|r| r.units),
            tariff_rate:           config.tariffs.rate_or_zero(&billing.tariff_plan),
            payment_status:        billing.payment_status,
            last_payment_date:     billing.last_payment_date,
            last_paid_amount:      billing.last_paid_amount,
            next_payment_deadline: billing.next_payment_deadline,
            days_until_deadline:   days_until(billing.next_payment_deadline, now),
            is_overdue:            is_overdue(billing, now),
            is_fine_applied:       billing.is_fine_applied,
            fine_details:          billing.fine,
            total_amount_due:      total_amount_due(billing, now),
            reminder:              classify_reminder(billing, &config.calendar, now),
            reading_pending,
            reading_window_start:  windows.reading_start,
            reading_window_end:    windows.reading_end,
        }
    }
}

/// Deadline-only breakdown for an arbitrary amount, with no consumer
/// record behind it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillBreakdown {
    pub bill_amount:         Money,
    pub deadline:            DateTime<Utc>,
    pub days_until_deadline: i64,
    pub is_overdue:          bool,
    pub reminder_kind:       ReminderKind,
    pub reminder_message:    String,
    pub fine_details:        Option<FineDetails>,
    pub total_amount_due:    Money,
}

pub fn calculate_bill_details(
    bill_amount: Money,
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
    policy: &FinePolicy,
) -> BillingResult<BillBreakdown> {
    if !bill_amount.is_finite() || bill_amount <= 0.0 {
        return Err(BillingError::InvalidBillAmount { amount: bill_amount });
    }

    let days_until_deadline = days_until(Some(deadline), now);
    let overdue = now > deadline;
    let reminder_kind = ReminderKind::for_deadline(days_until_deadline, overdue);
    let fine_details = overdue.then(|| policy.compute());
    let fine_total = fine_details.map(|f| f.total_fine_with_tax).unwrap_or(0.0);

    Ok(BillBreakdown {
        bill_amount: round2(bill_amount),
        deadline,
        days_until_deadline,
        is_overdue: overdue,
        reminder_kind,
        reminder_message: reminder_message(reminder_kind, days_until_deadline, deadline.date_naive()),
        fine_details,
        total_amount_due: round2(bill_amount + fine_total),
    })
}
