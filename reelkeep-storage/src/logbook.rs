//! Diagnostic log write path.

use crate::error::StorageResult;
use crate::retention::RetentionManager;
use crate::store::EntityStore;
use reelkeep_model::time::now_millis;
use reelkeep_model::{LogEntry, LogLevel};
use serde_json::Value;

/// Appends log entries and keeps the log table inside its retention bounds.
#[derive(Clone)]
pub struct Logbook {
    logs: EntityStore<LogEntry>,
    retention: RetentionManager,
}

impl Logbook {
    pub fn new(retention: RetentionManager) -> Self {
        Self {
            logs: retention.database().logs(),
            retention,
        }
    }

    pub fn append(&self, level: LogLevel, message: impl Into<String>, data: Option<Value>) -> StorageResult<LogEntry> {
        self.append_at(level, message, data, now_millis())
    }

    /// Store an entry stamped `now`, then run retention. A retention
    /// failure is recorded on the retention job, not returned here.
    pub fn append_at(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        data: Option<Value>,
        now: i64,
    ) -> StorageResult<LogEntry> {
        let mut entry = LogEntry::new(level, message, now);
        entry.data = data;
        let stored = self.logs.put(&entry)?;
        self.retention.enforce_log_retention(now);
        Ok(stored)
    }

    pub fn retention(&self) -> &RetentionManager {
        &self.retention
    }
}
