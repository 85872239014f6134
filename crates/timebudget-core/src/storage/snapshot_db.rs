//! SQLite-backed storage for weekly snapshot rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::format_ts;
use crate::error::Result;
use crate::plan::Plan;
use crate::snapshot::WeeklyItem;
use crate::week::WeekId;

const COLUMNS: &str = "id, user_id, week_year, week_number, plan_id, budget_item_id, name,
     weekly_duration_min, weekly_occurrences, icon, color, position, notes";

fn row_to_weekly_item(row: &Row) -> rusqlite::Result<WeeklyItem> {
    let year: i32 = row.get(2)?;
    let number: u32 = row.get(3)?;
    let week = WeekId::new(year, number).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Integer,
            format!("invalid ISO week {year}-W{number}").into(),
        )
    })?;
    Ok(WeeklyItem {
        id: Some(row.get(0)?),
        user_id: row.get(1)?,
        week,
        plan_id: row.get(4)?,
        budget_item_id: row.get(5)?,
        name: row.get(6)?,
        weekly_duration_min: row.get(7)?,
        weekly_occurrences: row.get(8)?,
        icon: row.get(9)?,
        color: row.get(10)?,
        position: row.get(11)?,
        notes: row.get(12)?,
    })
}

/// Live-copy fields pushed from an authoritative item.
#[derive(Debug, Clone, Copy)]
pub struct LiveFields<'a> {
    pub name: &'a str,
    pub icon: &'a str,
    pub color: &'a str,
    pub position: i64,
}

/// Snapshot repository bound to a connection or transaction.
pub struct SnapshotDb<'c> {
    conn: &'c Connection,
}

impl<'c> SnapshotDb<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn week_exists(&self, user_id: &str, week: WeekId) -> Result<bool> {
        let found: i64 = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM weekly_items
                            WHERE user_id = ?1 AND week_year = ?2 AND week_number = ?3)",
            params![user_id, week.year(), week.week()],
            |row| row.get(0),
        )?;
        Ok(found != 0)
    }

    /// Stored rows of a week ordered by position.
    pub fn for_week(&self, user_id: &str, week: WeekId) -> Result<Vec<WeeklyItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM weekly_items
             WHERE user_id = ?1 AND week_year = ?2 AND week_number = ?3
             ORDER BY position, name"
        ))?;
        let rows = stmt
            .query_map(params![user_id, week.year(), week.week()], row_to_weekly_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn find(&self, id: &str) -> Result<Option<WeeklyItem>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM weekly_items WHERE id = ?1"),
                params![id],
                row_to_weekly_item,
            )
            .optional()?)
    }

    /// A row by identity, only if it belongs to `user_id`.
    pub fn find_for_user(&self, user_id: &str, id: &str) -> Result<Option<WeeklyItem>> {
        Ok(self.find(id)?.filter(|row| row.user_id == user_id))
    }

    pub fn find_for_item(
        &self,
        user_id: &str,
        week: WeekId,
        budget_item_id: &str,
    ) -> Result<Option<WeeklyItem>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM weekly_items
                     WHERE user_id = ?1 AND week_year = ?2 AND week_number = ?3
                       AND budget_item_id = ?4"
                ),
                params![user_id, week.year(), week.week(), budget_item_id],
                row_to_weekly_item,
            )
            .optional()?)
    }

    /// Insert one row per item of `plan`, copying every field and leaving
    /// notes empty. Fails with a constraint violation if any row for the same
    /// (user, week, item) already exists.
    pub fn create_from_plan(
        &self,
        user_id: &str,
        week: WeekId,
        plan: &Plan,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO weekly_items
                (id, user_id, week_year, week_number, plan_id, budget_item_id, name,
                 weekly_duration_min, weekly_occurrences, icon, color, position, notes,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, '', ?13, ?13)",
        )?;
        let stamp = format_ts(now);
        for item in &plan.items {
            stmt.execute(params![
                Uuid::new_v4().to_string(),
                user_id,
                week.year(),
                week.week(),
                plan.id,
                item.id,
                item.name,
                item.weekly_duration_min,
                item.weekly_occurrences,
                item.icon,
                item.color,
                item.position,
                stamp,
            ])?;
        }
        Ok(plan.items.len())
    }

    pub fn update_duration_and_notes(
        &self,
        id: &str,
        weekly_duration_min: u32,
        notes: &str,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE weekly_items SET weekly_duration_min = ?2, notes = ?3, updated_at = ?4
             WHERE id = ?1",
            params![id, weekly_duration_min, notes, format_ts(now)],
        )?)
    }

    /// Push live-copy fields to every week's row of `budget_item_id`.
    pub fn update_live_fields(
        &self,
        user_id: &str,
        budget_item_id: &str,
        fields: LiveFields<'_>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE weekly_items
             SET name = ?3, icon = ?4, color = ?5, position = ?6, updated_at = ?7
             WHERE user_id = ?1 AND budget_item_id = ?2",
            params![
                user_id,
                budget_item_id,
                fields.name,
                fields.icon,
                fields.color,
                fields.position,
                format_ts(now),
            ],
        )?)
    }

    pub fn delete_week(&self, user_id: &str, week: WeekId) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM weekly_items WHERE user_id = ?1 AND week_year = ?2 AND week_number = ?3",
            params![user_id, week.year(), week.week()],
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::plan::PlanItem;
    use crate::storage::Database;

    fn plan() -> Plan {
        let item = |id: &str, pos: i64| PlanItem {
            id: id.into(),
            plan_id: "p".into(),
            name: id.to_uppercase(),
            weekly_duration_min: 90,
            weekly_occurrences: 3,
            icon: "i".into(),
            color: "c".into(),
            position: pos,
        };
        Plan {
            id: "p".into(),
            user_id: "u".into(),
            name: "plan".into(),
            is_current: true,
            created_at: Utc::now(),
            items: vec![item("b", 200), item("a", 100)],
        }
    }

    fn week() -> WeekId {
        WeekId::new(2026, 7).unwrap()
    }

    #[test]
    fn create_from_plan_copies_fields_and_orders_by_position() {
        let db = Database::open_memory().unwrap();
        db.read(|conn| {
            let snapshots = SnapshotDb::new(conn);
            assert!(!snapshots.week_exists("u", week())?);
            assert_eq!(snapshots.create_from_plan("u", week(), &plan(), Utc::now())?, 2);
            assert!(snapshots.week_exists("u", week())?);
            assert!(!snapshots.week_exists("u", week().next())?);

            let rows = snapshots.for_week("u", week())?;
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].budget_item_id, "a");
            assert!(rows.iter().all(|r| r.is_saved() && r.notes.is_empty()));
            assert_eq!(rows[1].weekly_occurrences, 3);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn second_bulk_insert_violates_uniqueness() {
        let db = Database::open_memory().unwrap();
        db.read(|conn| {
            let snapshots = SnapshotDb::new(conn);
            snapshots.create_from_plan("u", week(), &plan(), Utc::now())?;
            let err = snapshots
                .create_from_plan("u", week(), &plan(), Utc::now())
                .unwrap_err();
            assert!(matches!(err, CoreError::Database(ref e) if e.is_constraint_violation()));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn live_field_update_spans_weeks_and_leaves_overrides() {
        let db = Database::open_memory().unwrap();
        db.read(|conn| {
            let snapshots = SnapshotDb::new(conn);
            snapshots.create_from_plan("u", week(), &plan(), Utc::now())?;
            snapshots.create_from_plan("u", week().next(), &plan(), Utc::now())?;
            let row = snapshots.find_for_item("u", week(), "a")?.unwrap();
            snapshots.update_duration_and_notes(row.id.as_deref().unwrap(), 30, "x", Utc::now())?;

            let touched = snapshots.update_live_fields(
                "u",
                "a",
                LiveFields {
                    name: "Renamed",
                    icon: "star",
                    color: "red",
                    position: 300,
                },
                Utc::now(),
            )?;
            assert_eq!(touched, 2);

            let row = snapshots.find_for_item("u", week(), "a")?.unwrap();
            assert_eq!(row.name, "Renamed");
            assert_eq!(row.position, 300);
            assert_eq!(row.weekly_duration_min, 30);
            assert_eq!(row.notes, "x");
            assert_eq!(
                snapshots.update_live_fields(
                    "someone-else",
                    "a",
                    LiveFields { name: "n", icon: "", color: "", position: 0 },
                    Utc::now()
                )?,
                0
            );
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn delete_week_only_touches_that_week() {
        let db = Database::open_memory().unwrap();
        db.read(|conn| {
            let snapshots = SnapshotDb::new(conn);
            snapshots.create_from_plan("u", week(), &plan(), Utc::now())?;
            snapshots.create_from_plan("u", week().next(), &plan(), Utc::now())?;
            assert_eq!(snapshots.delete_week("u", week())?, 2);
            assert!(!snapshots.week_exists("u", week())?);
            assert!(snapshots.week_exists("u", week().next())?);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn find_for_user_hides_other_users_rows() {
        let db = Database::open_memory().unwrap();
        db.read(|conn| {
            let snapshots = SnapshotDb::new(conn);
            snapshots.create_from_plan("u", week(), &plan(), Utc::now())?;
            let id = snapshots.for_week("u", week())?[0].id.clone().unwrap();
            assert!(snapshots.find_for_user("u", &id)?.is_some());
            assert!(snapshots.find_for_user("intruder", &id)?.is_none());
            Ok(())
        })
        .unwrap();
    }
}
