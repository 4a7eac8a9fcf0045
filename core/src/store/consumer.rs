use super::{event_log::insert_event, BillingStore};
use crate::{
    consumer::{
        BillingState, ConsumerProfile, ConsumerRecord, FineDetails, PaymentStatus,
        ReadingEntry, ReminderFlags,
    },
    error::{BillingError, BillingResult},
    event::{BillingEvent, EventLogEntry},
};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row, TransactionBehavior};

const CONSUMER_COLUMNS: &str = "
    consumer_number, meter_serial_number, name, address, phone_number, tariff_plan,
    current_reading, amount, last_paid_amount, last_bill_date, next_payment_deadline,
    payment_status, last_payment_date,
    is_fine_applied, fine_amount, cgst_on_fine, sgst_on_fine, total_fine_with_tax,
    fine_applied_date,
    reminder_sent_7_days, reminder_sent_3_days, overdue_reminder_sent";

impl BillingStore {
    // ── Consumer ──────────────────────────────────────────────────

    /// Insert a new consumer and its registration event atomically.
    pub fn insert_consumer(
        &mut self,
        record: &ConsumerRecord,
        event: &BillingEvent,
    ) -> BillingResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if consumer_exists(&tx, record.consumer_number())? {
            return Err(BillingError::ConsumerAlreadyExists {
                consumer_number: record.consumer_number().to_string(),
            });
        }
        tx.execute(
            &format!(
                "INSERT INTO consumer ({CONSUMER_COLUMNS}) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                    ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22
                )"
            ),
            params![
                &record.profile.consumer_number,
                &record.profile.meter_serial_number,
                &record.profile.name,
                &record.profile.address,
                &record.profile.phone_number,
                &record.billing.tariff_plan,
                record.billing.current_reading,
                record.billing.amount,
                record.billing.last_paid_amount,
                record.billing.last_bill_date,
                record.billing.next_payment_deadline,
                record.billing.payment_status.as_str(),
                record.billing.last_payment_date,
                if record.billing.is_fine_applied { 1 } else { 0 },
                record.billing.fine.fine_amount,
                record.billing.fine.cgst_on_fine,
                record.billing.fine.sgst_on_fine,
                record.billing.fine.total_fine_with_tax,
                record.billing.fine_applied_date,
                if record.billing.reminders.reminder_sent_7_days { 1 } else { 0 },
                if record.billing.reminders.reminder_sent_3_days { 1 } else { 0 },
                if record.billing.reminders.overdue_reminder_sent { 1 } else { 0 },
            ],
        )?;
        insert_readings(&tx, record, 0)?;
        insert_event(&tx, &EventLogEntry::from_event(event)?)?;
        tx.commit()?;
        Ok(())
    }

    pub fn find_consumer(&self, consumer_number: &str) -> BillingResult<Option<ConsumerRecord>> {
        load_consumer(&self.conn, consumer_number)
    }

    /// Like `find_consumer`, but a missing record is an error.
    pub fn require_consumer(&self, consumer_number: &str) -> BillingResult<ConsumerRecord> {
        self.find_consumer(consumer_number)?
            .ok_or_else(|| BillingError::ConsumerNotFound {
                consumer_number: consumer_number.to_string(),
            })
    }

    /// Consumers whose status is Pending or Overdue.
    pub fn unpaid_consumer_numbers(&self) -> BillingResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT consumer_number FROM consumer
             WHERE payment_status != 'Paid'
             ORDER BY consumer_number ASC",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn all_consumers(&self) -> BillingResult<Vec<ConsumerRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONSUMER_COLUMNS} FROM consumer ORDER BY consumer_number ASC"
        ))?;
        let mut records = stmt
            .query_map([], consumer_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for record in &mut records {
            record.billing.readings = load_readings(&self.conn, record.consumer_number())?;
        }
        Ok(records)
    }

    pub fn consumer_count(&self) -> BillingResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM consumer", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn consumer_count_by_status(&self, status: PaymentStatus) -> BillingResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM consumer WHERE payment_status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Returns false if no such consumer existed. Reading history goes
    /// with the record; the event log is kept.
    pub fn delete_consumer(&mut self, consumer_number: &str) -> BillingResult<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM consumer WHERE consumer_number = ?1",
            params![consumer_number],
        )?;
        Ok(deleted > 0)
    }

    /// Atomic read-modify-write of one consumer.
    ///
    /// `f` mutates the loaded record and returns its output plus the events
    /// to log. An `Err` from `f` rolls everything back.
    pub fn with_consumer<T, F>(&mut self, consumer_number: &str, f: F) -> BillingResult<T>
    where
        F: FnOnce(&mut ConsumerRecord) -> BillingResult<(T, Vec<BillingEvent>)>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut record = load_consumer(&tx, consumer_number)?.ok_or_else(|| {
            BillingError::ConsumerNotFound {
                consumer_number: consumer_number.to_string(),
            }
        })?;
        let before = record.clone();

        let (output, events) = f(&mut record)?;

        if record != before {
            write_consumer(&tx, &record)?;
            insert_readings(&tx, &record, before.billing.readings.len())?;
        }
        for event in &events {
            insert_event(&tx, &EventLogEntry::from_event(event)?)?;
        }
        tx.commit()?;
        Ok(output)
    }
}

fn consumer_exists(conn: &Connection, consumer_number: &str) -> BillingResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM consumer WHERE consumer_number = ?1",
            params![consumer_number],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn load_consumer(conn: &Connection, consumer_number: &str) -> BillingResult<Option<ConsumerRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {CONSUMER_COLUMNS} FROM consumer WHERE consumer_number = ?1"),
            params![consumer_number],
            consumer_from_row,
        )
        .optional()?;
    match record {
        Some(mut r) => {
            r.billing.readings = load_readings(conn, consumer_number)?;
            Ok(Some(r))
        }
        None => Ok(None),
    }
}

fn load_readings(conn: &Connection, consumer_number: &str) -> BillingResult<Vec<ReadingEntry>> {
    let mut stmt = conn.prepare(
        "SELECT reading_date, units, manual_reading FROM meter_reading
         WHERE consumer_number = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map(params![consumer_number], |row| {
        Ok(ReadingEntry {
            date: row.get(0)?,
            units: row.get(1)?,
            manual_reading: row.get(2)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

fn write_consumer(conn: &Connection, record: &ConsumerRecord) -> BillingResult<()> {
    let b = &record.billing;
    conn.execute(
        "UPDATE consumer SET
            meter_serial_number = ?2, name = ?3, address = ?4, phone_number = ?5,
            tariff_plan = ?6, current_reading = ?7, amount = ?8, last_paid_amount = ?9,
            last_bill_date = ?10, next_payment_deadline = ?11, payment_status = ?12,
            last_payment_date = ?13, is_fine_applied = ?14, fine_amount = ?15,
            cgst_on_fine = ?16, sgst_on_fine = ?17, total_fine_with_tax = ?18,
            fine_applied_date = ?19, reminder_sent_7_days = ?20,
            reminder_sent_3_days = ?21, overdue_reminder_sent = ?22
         WHERE consumer_number = ?1",
        params![
            &record.profile.consumer_number,
            &record.profile.meter_serial_number,
            &record.profile.name,
            &record.profile.address,
            &record.profile.phone_number,
            &b.tariff_plan,
            b.current_reading,
            b.amount,
            b.last_paid_amount,
            b.last_bill_date,
            b.next_payment_deadline,
            b.payment_status.as_str(),
            b.last_payment_date,
            if b.is_fine_applied { 1 } else { 0 },
            b.fine.fine_amount,
            b.fine.cgst_on_fine,
            b.fine.sgst_on_fine,
            b.fine.total_fine_with_tax,
            b.fine_applied_date,
            if b.reminders.reminder_sent_7_days { 1 } else { 0 },
            if b.reminders.reminder_sent_3_days { 1 } else { 0 },
            if b.reminders.overdue_reminder_sent { 1 } else { 0 },
        ],
    )?;
    Ok(())
}

// History is append-only: only entries past `already_stored` are written.
fn insert_readings(
    conn: &Connection,
    record: &ConsumerRecord,
    already_stored: usize,
) -> BillingResult<()> {
    for (seq, entry) in record.billing.readings.iter().enumerate().skip(already_stored) {
        conn.execute(
            "INSERT INTO meter_reading (consumer_number, seq, reading_date, units, manual_reading)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.consumer_number(),
                seq as i64,
                entry.date,
                entry.units,
                entry.manual_reading,
            ],
        )?;
    }
    Ok(())
}

fn consumer_from_row(row: &Row<'_>) -> rusqlite::Result<ConsumerRecord> {
    let status_text: String = row.get(11)?;
    let payment_status = PaymentStatus::parse(&status_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            11,
            Type::Text,
            format!("unknown payment status '{status_text}'").into(),
        )
    })?;

    Ok(ConsumerRecord {
        profile: ConsumerProfile {
            consumer_number:     row.get(0)?,
            meter_serial_number: row.get(1)?,
            name:                row.get(2)?,
            address:             row.get(3)?,
            phone_number:        row.get(4)?,
        },
        billing: BillingState {
            tariff_plan:           row.get(5)?,
            current_reading:       row.get(6)?,
            amount:                row.get(7)?,
            last_paid_amount:      row.get(8)?,
            last_bill_date:        row.get(9)?,
            next_payment_deadline: row.get(10)?,
            payment_status,
            last_payment_date:     row.get(12)?,
            is_fine_applied:       row.get::<_, i32>(13)? != 0,
            fine: FineDetails {
                fine_amount:         row.get(14)?,
                cgst_on_fine:        row.get(15)?,
                sgst_on_fine:        row.get(16)?,
                total_fine_with_tax: row.get(17)?,
            },
            fine_applied_date:     row.get(18)?,
            reminders: ReminderFlags {
                reminder_sent_7_days:  row.get::<_, i32>(19)? != 0,
                reminder_sent_3_days:  row.get::<_, i32>(20)? != 0,
                overdue_reminder_sent: row.get::<_, i32>(21)? != 0,
            },
            readings: Vec::new(),
        },
    })
}
