//! Core error types for timebudget-core.
//!
//! This module defines the error hierarchy using thiserror. Storage errors
//! abort the enclosing operation; publish errors are reported after the
//! triggering write has already been committed.

use std::path::PathBuf;
use thiserror::Error;

use crate::bus::PublishError;
use crate::week::WeekId;

/// Core error type for timebudget-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The user has no plan flagged as current.
    #[error("No current budget plan for user '{user_id}'")]
    NoCurrentPlan { user_id: String },

    /// A plan lookup by identity failed.
    #[error("Budget plan '{plan_id}' not found")]
    PlanNotFound { plan_id: String },

    /// The authoritative plan item referenced by an operation no longer exists.
    #[error("Budget item '{item_id}' not found")]
    AuthoritativeItemNotFound { item_id: String },

    /// Snapshot rows already exist for the (user, week).
    #[error("Week {week} is already materialized for user '{user_id}'")]
    SnapshotAlreadyMaterialized { user_id: String, week: WeekId },

    /// No weekly snapshot row matches the identity.
    #[error("Weekly item '{snapshot_id}' not found")]
    SnapshotItemNotFound { snapshot_id: String },

    /// Publishing a change event failed after the write was committed.
    #[error("Event publish failed: {0}")]
    Publish(#[from] PublishError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// True for conditions an API layer reports as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::NoCurrentPlan { .. }
                | CoreError::PlanNotFound { .. }
                | CoreError::AuthoritativeItemNotFound { .. }
                | CoreError::SnapshotItemNotFound { .. }
        )
    }

    /// True for conditions an API layer reports as a conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::SnapshotAlreadyMaterialized { .. })
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A UNIQUE / FOREIGN KEY / CHECK constraint rejected the write
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

impl DatabaseError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, DatabaseError::ConstraintViolation(_))
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// No home/config directory available
    #[error("Cannot determine data directory")]
    NoDataDir,
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end_time ({end}) must be greater than start_time ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => match code.code {
                rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy => {
                    DatabaseError::Locked
                }
                rusqlite::ErrorCode::ConstraintViolation => {
                    DatabaseError::ConstraintViolation(err.to_string())
                }
                _ => DatabaseError::QueryFailed(err.to_string()),
            },
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
