//! SQLite connection ownership and scoped transactions.
//!
//! One connection is shared behind a mutex. Repositories ([`PlanDb`],
//! [`SnapshotDb`], [`TimeEntryDb`]) borrow it, either directly through
//! [`Database::read`] or bound to a transaction through
//! [`Database::transaction`].
//!
//! [`PlanDb`]: super::PlanDb
//! [`SnapshotDb`]: super::SnapshotDb
//! [`TimeEntryDb`]: super::TimeEntryDb

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::debug;

use super::migrations;
use crate::error::{DatabaseError, Result};

/// SQLite database holding plans, weekly snapshots and time entries.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open the database at `~/.config/timebudget/timebudget.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = super::data_dir()?.join("timebudget.db");
        Self::open_at(path)
    }

    /// Open (or create) the database at `path`.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| DatabaseError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        Self::init(conn, Some(path))
    }

    /// Open an in-memory database (tests, dry runs).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        debug!(path = ?path, "database ready");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // A panic inside a transaction unwinds through `Transaction::drop`, which
    // rolls back, so the connection behind a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the connection outside of an explicit transaction.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock();
        f(&conn)
    }

    /// Run `f` inside an `IMMEDIATE` transaction.
    ///
    /// Commits when `f` returns `Ok`; rolls back when it returns `Err` or
    /// unwinds.
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn count(db: &Database) -> i64 {
        db.read(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM budget_plans", [], |r| r.get(0))?)
        })
        .unwrap()
    }

    fn insert(conn: &Connection, id: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO budget_plans (id, user_id, name, created_at) VALUES (?1, 'u', 'n', '')",
            [id],
        )?;
        Ok(())
    }

    #[test]
    fn transaction_commits_on_ok() {
        let db = Database::open_memory().unwrap();
        db.transaction(|tx| insert(tx, "a")).unwrap();
        assert_eq!(count(&db), 1);
    }

    #[test]
    fn transaction_rolls_back_on_err() {
        let db = Database::open_memory().unwrap();
        let result: Result<()> = db.transaction(|tx| {
            insert(tx, "a")?;
            Err(CoreError::PlanNotFound {
                plan_id: "x".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(count(&db), 0);
    }

    #[test]
    fn transaction_rolls_back_on_panic_and_db_stays_usable() {
        let db = Database::open_memory().unwrap();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<()> = db.transaction(|tx| {
                insert(tx, "a")?;
                panic!("handler blew up");
            });
        }));
        assert!(outcome.is_err());
        assert_eq!(count(&db), 0);

        db.transaction(|tx| insert(tx, "b")).unwrap();
        assert_eq!(count(&db), 1);
    }

    #[test]
    fn open_at_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tb.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.transaction(|tx| insert(tx, "a")).unwrap();
        }
        let reopened = Database::open_at(&path).unwrap();
        assert_eq!(count(&reopened), 1);
        assert_eq!(reopened.path(), Some(path.as_path()));
    }
}
