//! Storage error types.

use reelkeep_model::{EntityKey, EntityKind};
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in store operations.
///
/// Absent keys are not errors: reads return `None` and deletes report
/// whether anything was removed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database is closed")]
    Closed,

    #[error("unknown index {index} on {kind}")]
    UnknownIndex { kind: EntityKind, index: String },

    #[error("invalid key range: {0}")]
    InvalidRange(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("transaction on {kind} aborted: {source}")]
    Transaction {
        kind: EntityKind,
        #[source]
        source: Box<StorageError>,
    },

    #[error("write verification failed for {kind} {key} after {attempts} attempts")]
    Verification {
        kind: EntityKind,
        key: EntityKey,
        attempts: u32,
    },

    #[error("migration to version {version} failed: {reason}")]
    Migration { version: u32, reason: String },
}

impl StorageError {
    /// True for errors raised by the read-back check of a verified write.
    pub fn is_verification(&self) -> bool {
        matches!(self, Self::Verification { .. })
    }
}
