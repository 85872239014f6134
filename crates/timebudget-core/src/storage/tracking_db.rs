//! SQLite-backed storage for time-tracking intervals.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_ts, parse_ts};
use crate::error::Result;
use crate::tracking::TimeEntry;

const COLUMNS: &str = "uid, user_id, summary, start_time, end_time, budget_item_id";

fn row_to_entry(row: &Row) -> rusqlite::Result<TimeEntry> {
    let start: String = row.get(3)?;
    let end: String = row.get(4)?;
    Ok(TimeEntry {
        uid: row.get(0)?,
        user_id: row.get(1)?,
        summary: row.get(2)?,
        start_time: parse_ts(&start, 3)?,
        end_time: parse_ts(&end, 4)?,
        budget_item_id: row.get(5)?,
    })
}

/// Time entry repository bound to a connection or transaction.
pub struct TimeEntryDb<'c> {
    conn: &'c Connection,
}

impl<'c> TimeEntryDb<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, entry: &TimeEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO time_entries (uid, user_id, summary, start_time, end_time, budget_item_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.uid,
                entry.user_id,
                entry.summary,
                format_ts(entry.start_time),
                format_ts(entry.end_time),
                entry.budget_item_id,
            ],
        )?;
        Ok(())
    }

    pub fn find(&self, uid: &str) -> Result<Option<TimeEntry>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM time_entries WHERE uid = ?1"),
                params![uid],
                row_to_entry,
            )
            .optional()?)
    }

    /// Entries of `user_id` starting in `[start, end)`, oldest first.
    pub fn for_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM time_entries
             WHERE user_id = ?1 AND start_time >= ?2 AND start_time < ?3
             ORDER BY start_time, uid"
        ))?;
        let entries = stmt
            .query_map(
                params![user_id, format_ts(start), format_ts(end)],
                row_to_entry,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn delete(&self, user_id: &str, uid: &str) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM time_entries WHERE uid = ?1 AND user_id = ?2",
            params![uid, user_id],
        )?)
    }
}
