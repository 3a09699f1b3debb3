use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed set of entity kinds the store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Record,
    Actor,
    LogEntry,
    NewWork,
    LinkCache,
    DailyAggregate,
    MonthlyReport,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Record,
        EntityKind::Actor,
        EntityKind::LogEntry,
        EntityKind::NewWork,
        EntityKind::LinkCache,
        EntityKind::DailyAggregate,
        EntityKind::MonthlyReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Record => "record",
            Self::Actor => "actor",
            Self::LogEntry => "log_entry",
            Self::NewWork => "new_work",
            Self::LinkCache => "link_cache",
            Self::DailyAggregate => "daily_aggregate",
            Self::MonthlyReport => "monthly_report",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary key of a stored entity.
///
/// Most kinds are keyed by a string; log entries use an auto-incrementing
/// integer assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityKey {
    Int(i64),
    Text(String),
}

impl EntityKey {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&String> for EntityKey {
    fn from(s: &String) -> Self {
        Self::Text(s.clone())
    }
}

impl From<i64> for EntityKey {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

/// An entity that can live in one of the store's tables.
///
/// The timestamp accessors default to "not tracked"; kinds that carry
/// `createdAt`/`updatedAt` override them so the store can keep creation
/// time stable and revision time monotonic across upserts.
pub trait StoredEntity:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: EntityKind;

    /// Primary key, or `None` for an entity whose key the store assigns.
    fn key(&self) -> Option<EntityKey>;

    /// Called by the store after it assigns an auto-increment key.
    fn assign_key(&mut self, _key: i64) {}

    fn created_at(&self) -> Option<i64> {
        None
    }

    fn set_created_at(&mut self, _ts: i64) {}

    fn updated_at(&self) -> Option<i64> {
        None
    }

    fn set_updated_at(&mut self, _ts: i64) {}
}
