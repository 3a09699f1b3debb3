//! Store, retry and retention configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for an opened [`Database`](crate::Database).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Rows fetched per step of a range scan.
    pub scan_batch_size: usize,

    /// How long SQLite waits on a locked database file before failing.
    pub busy_timeout_ms: u64,

    /// Retry policy for verified writes through the write queue.
    pub write_retry: RetryPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            scan_batch_size: 256,
            busy_timeout_ms: 5_000,
            write_retry: RetryPolicy::default(),
        }
    }
}

/// Bounded retry with linear backoff: attempt `n` waits `n * backoff_ms`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl RetryPolicy {
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(attempt as u64))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 100,
        }
    }
}

/// Log retention settings supplied by the settings collaborator.
/// A zero disables the corresponding policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionSettings {
    pub max_entries: usize,
    pub retention_days: u32,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            retention_days: 30,
        }
    }
}

/// Schedule of the link-cache TTL sweeper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtlSweepConfig {
    pub interval: Duration,
}

impl Default for TtlSweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(12 * 60 * 60),
        }
    }
}
