//! Billing event log.
//!
//! RULE: every state change the engine commits is recorded as an event in
//! the same transaction as the record write.

use crate::{
    consumer::FineDetails,
    reminder::ReminderKind,
    types::{ConsumerNumber, Money, Units},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BillingEvent {
    ConsumerRegistered {
        at: DateTime<Utc>,
        consumer_number: ConsumerNumber,
        tariff_plan: String,
    },
    ReadingAccepted {
        at: DateTime<Utc>,
        consumer_number: ConsumerNumber,
        reading_date: DateTime<Utc>,
        new_reading: Units,
        units_consumed: Units,
        amount: Money,
        deadline: DateTime<Utc>,
        admin_override: bool,
    },
    ReadingRejected {
        at: DateTime<Utc>,
        consumer_number: ConsumerNumber,
        reason: String,
    },
    FineApplied {
        at: DateTime<Utc>,
        consumer_number: ConsumerNumber,
        fine: FineDetails,
        deadline: Option<DateTime<Utc>>,
    },
    ZeroBalanceSettled {
        at: DateTime<Utc>,
        consumer_number: ConsumerNumber,
    },
    ReminderIssued {
        at: DateTime<Utc>,
        consumer_number: ConsumerNumber,
        kind: ReminderKind,
        days_until_deadline: i64,
    },
    PaymentSettled {
        at: DateTime<Utc>,
        consumer_number: ConsumerNumber,
        paid_amount: Money,
        fine_included: bool,
    },
}

impl BillingEvent {
    pub fn consumer_number(&self) -> &str {
        match self {
            Self::ConsumerRegistered { consumer_number, .. }
            | Self::ReadingAccepted { consumer_number, .. }
            | Self::ReadingRejected { consumer_number, .. }
            | Self::FineApplied { consumer_number, .. }
            | Self::ZeroBalanceSettled { consumer_number, .. }
            | Self::ReminderIssued { consumer_number, .. }
            | Self::PaymentSettled { consumer_number, .. } => consumer_number,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::ConsumerRegistered { at, .. }
            | Self::ReadingAccepted { at, .. }
            | Self::ReadingRejected { at, .. }
            | Self::FineApplied { at, .. }
            | Self::ZeroBalanceSettled { at, .. }
            | Self::ReminderIssued { at, .. }
            | Self::PaymentSettled { at, .. } => *at,
        }
    }

    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ConsumerRegistered { .. } => "consumer_registered",
            Self::ReadingAccepted { .. }    => "reading_accepted",
            Self::ReadingRejected { .. }    => "reading_rejected",
            Self::FineApplied { .. }        => "fine_applied",
            Self::ZeroBalanceSettled { .. } => "zero_balance_settled",
            Self::ReminderIssued { .. }     => "reminder_issued",
            Self::PaymentSettled { .. }     => "payment_settled",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:              Option<i64>,
    pub event_id:        String,
    pub consumer_number: ConsumerNumber,
    pub occurred_at:     DateTime<Utc>,
    pub event_type:      String,
    pub payload:         String, // JSON-serialized BillingEvent
}

impl EventLogEntry {
    pub fn from_event(event: &BillingEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id:              None,
            event_id:        uuid::Uuid::new_v4().to_string(),
            consumer_number: event.consumer_number().to_string(),
            occurred_at:     event.occurred_at(),
            event_type:      event.type_name().to_string(),
            payload:         serde_json::to_string(event)?,
        })
    }

    pub fn decode(&self) -> serde_json::Result<BillingEvent> {
        serde_json::from_str(&self.payload)
    }
}
