//! SQLite-backed storage for budget plans and their items.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_ts, parse_ts};
use crate::error::{CoreError, Result};
use crate::plan::{Plan, PlanItem, PlanReader};

const PLAN_COLUMNS: &str = "id, user_id, name, is_current, created_at";
const ITEM_COLUMNS: &str =
    "id, plan_id, name, weekly_duration_min, weekly_occurrences, icon, color, position";

fn row_to_plan(row: &Row) -> rusqlite::Result<Plan> {
    let created_at: String = row.get(4)?;
    Ok(Plan {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        is_current: row.get(3)?,
        created_at: parse_ts(&created_at, 4)?,
        items: Vec::new(),
    })
}

fn row_to_item(row: &Row) -> rusqlite::Result<PlanItem> {
    Ok(PlanItem {
        id: row.get(0)?,
        plan_id: row.get(1)?,
        name: row.get(2)?,
        weekly_duration_min: row.get(3)?,
        weekly_occurrences: row.get(4)?,
        icon: row.get(5)?,
        color: row.get(6)?,
        position: row.get(7)?,
    })
}

/// Plan repository bound to a connection or transaction.
pub struct PlanDb<'c> {
    conn: &'c Connection,
}

impl<'c> PlanDb<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    // === Plans ===

    /// Insert a plan row. Items are inserted separately.
    pub fn insert_plan(&self, plan: &Plan) -> Result<()> {
        self.conn.execute(
            "INSERT INTO budget_plans (id, user_id, name, is_current, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                plan.id,
                plan.user_id,
                plan.name,
                plan.is_current,
                format_ts(plan.created_at),
            ],
        )?;
        Ok(())
    }

    /// Get a plan by ID, with items.
    pub fn find_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
        let plan = self
            .conn
            .query_row(
                &format!("SELECT {PLAN_COLUMNS} FROM budget_plans WHERE id = ?1"),
                params![plan_id],
                row_to_plan,
            )
            .optional()?;
        self.with_items(plan)
    }

    /// The current plan of `user_id`, with items.
    pub fn find_current_plan(&self, user_id: &str) -> Result<Option<Plan>> {
        let plan = self
            .conn
            .query_row(
                &format!(
                    "SELECT {PLAN_COLUMNS} FROM budget_plans WHERE user_id = ?1 AND is_current = 1"
                ),
                params![user_id],
                row_to_plan,
            )
            .optional()?;
        self.with_items(plan)
    }

    /// All plans of `user_id`, oldest first, with items.
    pub fn list_plans(&self, user_id: &str) -> Result<Vec<Plan>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PLAN_COLUMNS} FROM budget_plans WHERE user_id = ?1 ORDER BY created_at, id"
        ))?;
        let plans = stmt
            .query_map(params![user_id], row_to_plan)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        plans
            .into_iter()
            .map(|mut plan| {
                plan.items = self.items_for_plan(&plan.id)?;
                Ok(plan)
            })
            .collect()
    }

    pub fn has_current_plan(&self, user_id: &str) -> Result<bool> {
        let found: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM budget_plans WHERE user_id = ?1 AND is_current = 1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(found > 0)
    }

    /// Make `plan_id` the only current plan of `user_id`.
    ///
    /// Returns `false` if the plan does not belong to the user.
    pub fn set_current_plan(&self, user_id: &str, plan_id: &str) -> Result<bool> {
        let owned: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM budget_plans WHERE user_id = ?1 AND id = ?2",
            params![user_id, plan_id],
            |row| row.get(0),
        )?;
        if owned == 0 {
            return Ok(false);
        }
        self.conn.execute(
            "UPDATE budget_plans SET is_current = 0 WHERE user_id = ?1 AND is_current = 1",
            params![user_id],
        )?;
        self.conn.execute(
            "UPDATE budget_plans SET is_current = 1 WHERE user_id = ?1 AND id = ?2",
            params![user_id, plan_id],
        )?;
        Ok(true)
    }

    pub fn rename_plan(&self, plan_id: &str, name: &str) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE budget_plans SET name = ?2 WHERE id = ?1",
            params![plan_id, name],
        )?)
    }

    /// Delete a plan; its items go with it.
    pub fn delete_plan(&self, plan_id: &str) -> Result<usize> {
        self.conn
            .execute("DELETE FROM budget_items WHERE plan_id = ?1", params![plan_id])?;
        Ok(self
            .conn
            .execute("DELETE FROM budget_plans WHERE id = ?1", params![plan_id])?)
    }

    fn with_items(&self, plan: Option<Plan>) -> Result<Option<Plan>> {
        match plan {
            Some(mut plan) => {
                plan.items = self.items_for_plan(&plan.id)?;
                Ok(Some(plan))
            }
            None => Ok(None),
        }
    }

    // === Items ===

    /// Items of a plan ordered by position.
    pub fn items_for_plan(&self, plan_id: &str) -> Result<Vec<PlanItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM budget_items WHERE plan_id = ?1 ORDER BY position, id"
        ))?;
        let items = stmt
            .query_map(params![plan_id], row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    pub fn find_item(&self, item_id: &str) -> Result<Option<PlanItem>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM budget_items WHERE id = ?1"),
                params![item_id],
                row_to_item,
            )
            .optional()?)
    }

    pub fn insert_item(&self, item: &PlanItem) -> Result<()> {
        self.conn.execute(
            "INSERT INTO budget_items
                (id, plan_id, name, weekly_duration_min, weekly_occurrences, icon, color, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                item.id,
                item.plan_id,
                item.name,
                item.weekly_duration_min,
                item.weekly_occurrences,
                item.icon,
                item.color,
                item.position,
            ],
        )?;
        Ok(())
    }

    /// Overwrite every editable field of an item.
    pub fn update_item(&self, item: &PlanItem) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE budget_items
             SET name = ?2, weekly_duration_min = ?3, weekly_occurrences = ?4,
                 icon = ?5, color = ?6, position = ?7
             WHERE id = ?1",
            params![
                item.id,
                item.name,
                item.weekly_duration_min,
                item.weekly_occurrences,
                item.icon,
                item.color,
                item.position,
            ],
        )?)
    }

    pub fn update_position(&self, item_id: &str, position: i64) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE budget_items SET position = ?2 WHERE id = ?1",
            params![item_id, position],
        )?)
    }

    pub fn delete_item(&self, item_id: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM budget_items WHERE id = ?1", params![item_id])?)
    }
}

impl PlanReader for PlanDb<'_> {
    fn current_plan(&self, user_id: &str) -> Result<Plan> {
        self.find_current_plan(user_id)?
            .ok_or_else(|| CoreError::NoCurrentPlan {
                user_id: user_id.to_string(),
            })
    }

    fn plan(&self, plan_id: &str) -> Result<Plan> {
        self.find_plan(plan_id)?.ok_or_else(|| CoreError::PlanNotFound {
            plan_id: plan_id.to_string(),
        })
    }

    fn item(&self, item_id: &str) -> Result<PlanItem> {
        self.find_item(item_id)?
            .ok_or_else(|| CoreError::AuthoritativeItemNotFound {
                item_id: item_id.to_string(),
            })
    }
}
