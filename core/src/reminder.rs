//! Reminder classifier.
//!
//! PRECEDENCE (first match wins), against the cycle containing `now`:
//!   1. reading: reading window open, no reading recorded in it
//!   2. overdue: deadline passed, bill unpaid
//!   3. urgent:  payment window, 0 < days ≤ 3
//!   4. warning: payment window, 3 < days ≤ 7
//!   5. notice:  payment window, days > 7
//!   6. none

use crate::{
    consumer::BillingState,
    cycle::CycleCalendar,
    fine::is_overdue,
    reading::has_reading_in_window,
    types::ceil_days,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    Reading,
    Overdue,
    Urgent,
    Warning,
    Notice,
    None,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reading => "reading",
            Self::Overdue => "overdue",
            Self::Urgent  => "urgent",
            Self::Warning => "warning",
            Self::Notice  => "notice",
            Self::None    => "none",
        }
    }

    /// Deadline-only rule, used where no cycle context applies.
    pub fn for_deadline(days_until_deadline: i64, overdue: bool) -> Self {
        if overdue {
            Self::Overdue
        } else if days_until_deadline > 0 && days_until_deadline <= 3 {
            Self::Urgent
        } else if days_until_deadline > 3 && days_until_deadline <= 7 {
            Self::Warning
        } else if days_until_deadline > 7 {
            Self::Notice
        } else {
            Self::None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reminder {
    pub kind:                ReminderKind,
    pub message:             String,
    /// Whole days (rounded up) until the payment deadline; 0 without one.
    pub days_until_deadline: i64,
    /// Days left to submit a reading; set only for `Reading`.
    pub reading_days_left:   Option<i64>,
}

pub fn days_until(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    deadline
        .map(|d| ceil_days((d - now).num_milliseconds()))
        .unwrap_or(0)
}

pub fn classify_reminder(
    state: &BillingState,
    calendar: &CycleCalendar,
    now: DateTime<Utc>,
) -> Reminder {
    let today = now.date_naive();
    let windows = calendar.resolve(today);
    let deadline = state.next_payment_deadline;
    let days_until_deadline = days_until(deadline, now);

    if windows.in_reading_window(today) && !has_reading_in_window(state, calendar, today) {
        let days_left = ceil_days((windows.reading_deadline() - now).num_milliseconds()).max(0);
        return Reminder {
            kind: ReminderKind::Reading,
            message: format!(
                "Reading required: submit meter reading by {} ({days_left} day(s) left).",
                display_date(windows.reading_end)
            ),
            days_until_deadline,
            reading_days_left: Some(days_left),
        };
    }

    let kind = match deadline {
        Some(_) if is_overdue(state, now) => ReminderKind::Overdue,
        Some(_) if windows.in_payment_window(today) && !state.is_zero_balance_pending() => {
            ReminderKind::for_deadline(days_until_deadline, false)
        }
        _ => ReminderKind::None,
    };

    Reminder {
        kind,
        message: deadline
            .map(|d| reminder_message(kind, days_until_deadline, d.date_naive()))
            .unwrap_or_default(),
        days_until_deadline,
        reading_days_left: None,
    }
}

pub fn reminder_message(kind: ReminderKind, days_until_deadline: i64, deadline: NaiveDate) -> String {
    let date = display_date(deadline);
    match kind {
        ReminderKind::Overdue => format!(
            "OVERDUE: Your bill payment was due on {date}. Please pay immediately to avoid further penalties."
        ),
        ReminderKind::Urgent => format!(
            "URGENT: Only {days_until_deadline} day(s) left to pay your bill! Deadline: {date}"
        ),
        ReminderKind::Warning => format!(
            "REMINDER: Your bill is due in {days_until_deadline} days. Deadline: {date}"
        ),
        ReminderKind::Notice => format!(
            "Upcoming Bill: Your next payment is due on {date} ({days_until_deadline} days remaining)"
        ),
        ReminderKind::Reading | ReminderKind::None => String::new(),
    }
}

/// Flip the sent-flag that tracks `kind`. Returns false when the flag was
/// already set or `kind` is not tracked.
pub fn mark_reminder_sent(state: &mut BillingState, kind: ReminderKind) -> bool {
    let flag = match kind {
        ReminderKind::Warning => &mut state.reminders.reminder_sent_7_days,
        ReminderKind::Urgent  => &mut state.reminders.reminder_sent_3_days,
        ReminderKind::Overdue => &mut state.reminders.overdue_reminder_sent,
        _ => return false,
    };
    if *flag {
        return false;
    }
    *flag = true;
    true
}

fn display_date(date: NaiveDate) -> String {
    date.format("%a %b %d %Y").to_string()
}
