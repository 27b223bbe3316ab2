//! Core error types for habitroom-core.
//!
//! Every failure a boundary can observe carries a stable code (see
//! [`CoreError::code`]) so callers can branch on the kind of failure without
//! parsing messages. `CONFLICT` is kept apart from the other client errors
//! because it is expected under concurrent load and a fresh-read retry may
//! succeed.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Core error type for habitroom-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Input rejected before touching storage
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Owner '{owner_id}' already has an active challenge")]
    DuplicateActive { owner_id: String },

    #[error("Owner '{owner_id}' does not own challenge {challenge_id}")]
    Unauthorized { owner_id: String, challenge_id: i64 },

    #[error("Date {date} is outside the current window of challenge {challenge_id}")]
    OutOfPeriod { challenge_id: i64, date: NaiveDate },

    #[error("Batch spans {} challenges: {challenge_ids:?}", .challenge_ids.len())]
    CrossChallenge { challenge_ids: Vec<i64> },

    #[error("Daily routine limit of {limit} would be exceeded on {date}")]
    LimitExceeded { date: NaiveDate, limit: u32 },

    /// Another writer committed to the progress aggregate first
    #[error("Progress {progress_id} was modified concurrently (expected version {expected_version})")]
    Conflict { progress_id: i64, expected_version: i64 },

    #[error("Challenge {challenge_id} has already finished")]
    Terminal { challenge_id: i64 },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Report a refused write lock as the optimistic conflict it stands for.
    ///
    /// A writer whose snapshot went stale is refused by the database before
    /// its version check can run; the outcome is the same lost race.
    pub fn busy_as_conflict(self, progress_id: i64, expected_version: i64) -> Self {
        match self {
            CoreError::Database(DatabaseError::Busy | DatabaseError::Locked) => CoreError::Conflict {
                progress_id,
                expected_version,
            },
            other => other,
        }
    }

    /// Stable machine-readable code for the boundary.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::DuplicateActive { .. } => "DUPLICATE_ACTIVE",
            CoreError::Unauthorized { .. } => "AUTHORIZATION",
            CoreError::OutOfPeriod { .. } => "OUT_OF_PERIOD",
            CoreError::CrossChallenge { .. } => "CROSS_CHALLENGE",
            CoreError::LimitExceeded { .. } => "LIMIT_EXCEEDED",
            CoreError::Conflict { .. } => "CONFLICT",
            CoreError::Terminal { .. } => "TERMINAL",
            CoreError::Database(_) | CoreError::Io(_) | CoreError::Json(_) => "INTERNAL",
            CoreError::Config(_) => "CONFIG",
        }
    }

    /// Whether a caller may retry the operation after re-reading state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Conflict { .. })
    }

    /// Whether the failure is caused by the request rather than the system.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            CoreError::Database(_) | CoreError::Config(_) | CoreError::Io(_) | CoreError::Json(_)
        )
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}

/// Structured error payload handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
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

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Another connection holds the write lock
    #[error("Database is busy")]
    Busy,

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A stored value could not be decoded
    #[error("Corrupt value in column '{column}': {value}")]
    Corrupt { column: &'static str, value: String },
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

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),

    #[error("Unknown category id: {0}")]
    UnknownCategory(u32),

    /// Too many or too few entries
    #[error("'{field}' must contain between {min} and {max} entries (got {len})")]
    Cardinality {
        field: String,
        min: usize,
        max: usize,
        len: usize,
    },

    #[error("Routine {0} appears more than once in the batch")]
    DuplicateItem(i64),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => match code.code {
                rusqlite::ErrorCode::DatabaseBusy => DatabaseError::Busy,
                rusqlite::ErrorCode::DatabaseLocked => DatabaseError::Locked,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let conflict = CoreError::Conflict {
            progress_id: 1,
            expected_version: 3,
        };
        assert_eq!(conflict.code(), "CONFLICT");
        assert!(conflict.is_retryable());
        assert!(conflict.is_client_error());

        let missing = CoreError::not_found("routine", 42);
        assert_eq!(missing.code(), "NOT_FOUND");
        assert_eq!(missing.to_string(), "routine not found: 42");
        assert!(!missing.is_retryable());
    }

    #[test]
    fn validation_wraps_through_from() {
        let err: CoreError = ValidationError::UnknownCategory(9).into();
        assert_eq!(err.code(), "VALIDATION");
        let body = err.to_body();
        assert_eq!(body.code, "VALIDATION");
        assert!(body.message.contains("Unknown category id: 9"));
    }

    #[test]
    fn busy_sqlite_failure_is_classified() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(DatabaseError::from(err), DatabaseError::Busy));
    }

    #[test]
    fn busy_write_becomes_conflict() {
        let err = CoreError::Database(DatabaseError::Busy).busy_as_conflict(3, 8);
        assert!(matches!(
            err,
            CoreError::Conflict {
                progress_id: 3,
                expected_version: 8
            }
        ));
        let untouched = CoreError::not_found("routine", 1).busy_as_conflict(3, 8);
        assert_eq!(untouched.code(), "NOT_FOUND");
    }

    #[test]
    fn storage_failures_are_not_client_errors() {
        let err = CoreError::Database(DatabaseError::Locked);
        assert_eq!(err.code(), "INTERNAL");
        assert!(!err.is_client_error());
    }
}
