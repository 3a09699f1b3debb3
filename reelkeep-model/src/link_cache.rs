use crate::kind::{EntityKey, EntityKind, StoredEntity};
use serde::{Deserialize, Serialize};

/// Resolved links for one subject from one source, cached until `expire_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCacheEntry {
    pub subject_id: String,
    pub source: String,
    pub hash: String,
    #[serde(default)]
    pub links: Vec<String>,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<i64>,
}

impl LinkCacheEntry {
    pub fn new(
        subject_id: impl Into<String>,
        source: impl Into<String>,
        hash: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            source: source.into(),
            hash: hash.into(),
            links: Vec::new(),
            created_at,
            expire_at: None,
        }
    }

    pub fn with_ttl(mut self, ttl_ms: i64) -> Self {
        self.expire_at = Some(self.created_at + ttl_ms);
        self
    }

    /// Composite key: `subjectId|source|hash`.
    pub fn cache_key(&self) -> String {
        Self::compose_key(&self.subject_id, &self.source, &self.hash)
    }

    pub fn compose_key(subject_id: &str, source: &str, hash: &str) -> String {
        format!("{subject_id}|{source}|{hash}")
    }

    /// An entry is dead once `expire_at <= now`. Entries without an expiry never die.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expire_at.is_some_and(|at| at <= now)
    }
}

impl StoredEntity for LinkCacheEntry {
    const KIND: EntityKind = EntityKind::LinkCache;

    fn key(&self) -> Option<EntityKey> {
        Some(EntityKey::Text(self.cache_key()))
    }

    fn created_at(&self) -> Option<i64> {
        Some(self.created_at)
    }

    fn set_created_at(&mut self, ts: i64) {
        self.created_at = ts;
    }
}
