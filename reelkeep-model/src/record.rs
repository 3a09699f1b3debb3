use crate::kind::{EntityKey, EntityKind, StoredEntity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How far the user has engaged with a catalog item.
///
/// Variant order is the advisory priority used when two copies disagree:
/// `Browsed < Want < Viewed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Browsed,
    Want,
    Viewed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Browsed => "browsed",
            Self::Want => "want",
            Self::Viewed => "viewed",
        }
    }

    /// Returns whichever status ranks higher.
    pub fn max_priority(self, other: Self) -> Self {
        self.max(other)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog item, keyed by its catalog id (e.g. `ABC-123`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub id: String,
    pub title: String,
    pub status: RecordStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
}

impl CatalogRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>, status: RecordStatus, now: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            release_date: None,
            source_url: None,
            cover_image: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

impl StoredEntity for CatalogRecord {
    const KIND: EntityKind = EntityKind::Record;

    fn key(&self) -> Option<EntityKey> {
        Some(EntityKey::Text(self.id.clone()))
    }

    fn created_at(&self) -> Option<i64> {
        Some(self.created_at)
    }

    fn set_created_at(&mut self, ts: i64) {
        self.created_at = ts;
    }

    fn updated_at(&self) -> Option<i64> {
        Some(self.updated_at)
    }

    fn set_updated_at(&mut self, ts: i64) {
        self.updated_at = ts;
    }
}
