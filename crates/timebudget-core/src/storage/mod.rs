mod config;
pub mod database;
pub mod migrations;
pub mod plan_db;
pub mod snapshot_db;
pub mod tracking_db;

pub use config::{BusConfig, Config, StorageConfig, UserConfig, WeekConfig};
pub use database::Database;
pub use plan_db::PlanDb;
pub use snapshot_db::SnapshotDb;
pub use tracking_db::TimeEntryDb;

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::ConfigError;

/// Returns `~/.config/timebudget[-dev]/` based on TIMEBUDGET_ENV.
///
/// Set TIMEBUDGET_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TIMEBUDGET_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("timebudget-dev")
    } else {
        base_dir.join("timebudget")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::LoadFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}

/// Fixed-width UTC timestamp so stored values sort lexicographically.
pub(crate) fn format_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_ts(raw: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}
