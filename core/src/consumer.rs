//! Consumer records: identity profile plus the billing state the
//! rule functions transform.

use crate::types::{ConsumerNumber, Money, Units};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Pending,
    Overdue,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid    => "Paid",
            Self::Pending => "Pending",
            Self::Overdue => "Overdue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Paid"    => Some(Self::Paid),
            "Pending" => Some(Self::Pending),
            "Overdue" => Some(Self::Overdue),
            _ => None,
        }
    }
}

/// Breakdown of the flat fine and its tax components.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct FineDetails {
    pub fine_amount:         Money,
    pub cgst_on_fine:        Money,
    pub sgst_on_fine:        Money,
    pub total_fine_with_tax: Money,
}

/// One accepted meter reading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadingEntry {
    pub date:           DateTime<Utc>,
    /// Units billed for this reading.
    pub units:          Units,
    /// Cumulative meter value recorded.
    pub manual_reading: Units,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderFlags {
    pub reminder_sent_7_days:  bool,
    pub reminder_sent_3_days:  bool,
    pub overdue_reminder_sent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillingState {
    pub tariff_plan:           String,
    pub current_reading:       Units,
    pub amount:                Money,
    pub last_paid_amount:      Money,
    pub last_bill_date:        Option<DateTime<Utc>>,
    pub next_payment_deadline: Option<DateTime<Utc>>,
    pub payment_status:        PaymentStatus,
    pub last_payment_date:     Option<DateTime<Utc>>,
    pub is_fine_applied:       bool,
    pub fine:                  FineDetails,
    pub fine_applied_date:     Option<DateTime<Utc>>,
    pub reminders:             ReminderFlags,
    pub readings:              Vec<ReadingEntry>,
}

impl BillingState {
    /// Fresh state for a newly registered consumer.
    pub fn new(tariff_plan: impl Into<String>, initial_reading: Units) -> Self {
        Self {
            tariff_plan:           tariff_plan.into(),
            current_reading:       initial_reading,
            amount:                0.0,
            last_paid_amount:      0.0,
            last_bill_date:        None,
            next_payment_deadline: None,
            payment_status:        PaymentStatus::Pending,
            last_payment_date:     None,
            is_fine_applied:       false,
            fine:                  FineDetails::default(),
            fine_applied_date:     None,
            reminders:             ReminderFlags::default(),
            readings:              Vec::new(),
        }
    }

    /// Pending with nothing owed. Such a bill is settled, not outstanding.
    pub fn is_zero_balance_pending(&self) -> bool {
        self.payment_status == PaymentStatus::Pending && self.amount <= 0.0
    }

    /// Clears every fine field.
    pub fn clear_fine(&mut self) {
        self.is_fine_applied = false;
        self.fine = FineDetails::default();
        self.fine_applied_date = None;
    }

    pub fn last_reading(&self) -> Option<&ReadingEntry> {
        self.readings.last()
    }

    /// Previous cumulative meter value shown to the person submitting.
    pub fn previous_meter_reading(&self) -> Units {
        self.last_reading()
            .map(|r| r.manual_reading)
            .unwrap_or(self.current_reading)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsumerProfile {
    pub consumer_number:     ConsumerNumber,
    pub meter_serial_number: String,
    pub name:                String,
    pub address:             String,
    pub phone_number:        String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsumerRecord {
    pub profile: ConsumerProfile,
    pub billing: BillingState,
}

impl ConsumerRecord {
    pub fn consumer_number(&self) -> &str {
        &self.profile.consumer_number
    }
}

/// Partial profile edit. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub meter_serial_number: Option<String>,
    pub name:                Option<String>,
    pub address:             Option<String>,
    pub phone_number:        Option<String>,
    pub tariff_plan:         Option<String>,
}

/// What a meter reader sees before submitting a reading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeterDetails {
    pub name:                String,
    pub meter_serial_number: String,
    pub tariff_plan:         String,
    pub previous_reading:    Units,
    pub last_units_consumed: Units,
    pub amount:              Money,
    pub last_reading_date:   Option<DateTime<Utc>>,
}

impl MeterDetails {
    pub fn from_record(record: &ConsumerRecord) -> Self {
        let last = record.billing.last_reading();
        Self {
            name:                record.profile.name.clone(),
            meter_serial_number: record.profile.meter_serial_number.clone(),
            tariff_plan:         record.billing.tariff_plan.clone(),
            previous_reading:    record.billing.previous_meter_reading(),
            last_units_consumed: last.map(|r| r.units).unwrap_or(0.0),
            amount:              record.billing.amount,
            last_reading_date:   last.map(|r| r.date),
        }
    }
}
