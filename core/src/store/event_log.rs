use super::BillingStore;
use crate::{
    error::BillingResult,
    event::{BillingEvent, EventLogEntry},
};
use rusqlite::{params, Connection, Row};

impl BillingStore {
    // ── Event log ──────────────────────────────────────────────

    /// Log an event outside any record write (e.g. a rejected submission).
    pub fn append_event(&self, event: &BillingEvent) -> BillingResult<()> {
        insert_event(&self.conn, &EventLogEntry::from_event(event)?)
    }

    pub fn events_for_consumer(&self, consumer_number: &str) -> BillingResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_id, consumer_number, occurred_at, event_type, payload
             FROM billing_event WHERE consumer_number = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![consumer_number], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Every logged event in insertion order.
    pub fn all_events(&self) -> BillingResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_id, consumer_number, occurred_at, event_type, payload
             FROM billing_event ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map([], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, event_type: &str) -> BillingResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM billing_event WHERE event_type = ?1",
            params![event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

pub(super) fn insert_event(conn: &Connection, entry: &EventLogEntry) -> BillingResult<()> {
    conn.execute(
        "INSERT INTO billing_event (event_id, consumer_number, occurred_at, event_type, payload)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.event_id,
            entry.consumer_number,
            entry.occurred_at,
            entry.event_type,
            entry.payload,
        ],
    )?;
    Ok(())
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<EventLogEntry> {
    Ok(EventLogEntry {
        id:              Some(row.get(0)?),
        event_id:        row.get(1)?,
        consumer_number: row.get(2)?,
        occurred_at:     row.get(3)?,
        event_type:      row.get(4)?,
        payload:         row.get(5)?,
    })
}
