//! Database schema migrations for timebudget.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    match conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    }) {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: plans, plan items, weekly snapshot rows and time entries.
///
/// `weekly_items` carries the (user, week, budget item) uniqueness constraint
/// that also guards concurrent materialization. It deliberately has no
/// foreign key to `budget_items`: snapshot rows outlive deleted items.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS budget_plans (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            name        TEXT NOT NULL,
            is_current  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS budget_items (
            id                  TEXT PRIMARY KEY,
            plan_id             TEXT NOT NULL REFERENCES budget_plans(id) ON DELETE CASCADE,
            name                TEXT NOT NULL,
            weekly_duration_min INTEGER NOT NULL,
            weekly_occurrences  INTEGER NOT NULL DEFAULT 1,
            icon                TEXT NOT NULL DEFAULT '',
            color               TEXT NOT NULL DEFAULT '',
            position            INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS weekly_items (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL,
            week_year           INTEGER NOT NULL,
            week_number         INTEGER NOT NULL,
            plan_id             TEXT NOT NULL,
            budget_item_id      TEXT NOT NULL,
            name                TEXT NOT NULL,
            weekly_duration_min INTEGER NOT NULL,
            weekly_occurrences  INTEGER NOT NULL,
            icon                TEXT NOT NULL DEFAULT '',
            color               TEXT NOT NULL DEFAULT '',
            position            INTEGER NOT NULL,
            notes               TEXT NOT NULL DEFAULT '',
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL,
            UNIQUE (user_id, week_year, week_number, budget_item_id)
        );

        CREATE TABLE IF NOT EXISTS time_entries (
            uid             TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL,
            summary         TEXT NOT NULL DEFAULT '',
            start_time      TEXT NOT NULL,
            end_time        TEXT NOT NULL,
            budget_item_id  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_budget_plans_user ON budget_plans(user_id);
        CREATE INDEX IF NOT EXISTS idx_budget_items_plan_position ON budget_items(plan_id, position);
        CREATE INDEX IF NOT EXISTS idx_weekly_items_user_item ON weekly_items(user_id, budget_item_id);
        CREATE INDEX IF NOT EXISTS idx_time_entries_user_start ON time_entries(user_id, start_time);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: at most one current plan per user.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    // Keep only the most recently created current plan per user before
    // the unique index is added.
    tx.execute(
        "UPDATE budget_plans SET is_current = 0
         WHERE is_current = 1
           AND id NOT IN (
               SELECT id FROM budget_plans p
               WHERE p.is_current = 1
                 AND p.created_at = (
                     SELECT MAX(created_at) FROM budget_plans q
                     WHERE q.user_id = p.user_id AND q.is_current = 1
                 )
           )",
        [],
    )?;
    tx.execute_batch(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_budget_plans_one_current
         ON budget_plans(user_id) WHERE is_current = 1;",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()
}
