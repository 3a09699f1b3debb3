//! Sync error types.

use reelkeep_storage::StorageError;
use thiserror::Error;

/// Result type for snapshot, diff and restore operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while importing or restoring a snapshot.
///
/// Bad individual entries never surface here: import skips and counts them.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}
