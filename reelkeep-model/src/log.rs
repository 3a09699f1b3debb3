use crate::kind::{EntityKey, EntityKind, StoredEntity};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// A diagnostic log line. Append-only apart from retention deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Assigned by the store on first put.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub level: LogLevel,
    pub message: String,
    /// An explicit JSON `null` stays `Some(Null)`; only an absent field is `None`.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present_value")]
    pub data: Option<serde_json::Value>,
    pub timestamp_ms: i64,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            id: None,
            level,
            message: message.into(),
            data: None,
            timestamp_ms,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl StoredEntity for LogEntry {
    const KIND: EntityKind = EntityKind::LogEntry;

    fn key(&self) -> Option<EntityKey> {
        self.id.map(EntityKey::Int)
    }

    fn assign_key(&mut self, key: i64) {
        self.id = Some(key);
    }
}
