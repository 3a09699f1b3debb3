use crate::kind::{EntityKey, EntityKind, StoredEntity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorCategory {
    Censored,
    Uncensored,
    Western,
    Unknown,
}

/// A performer. `aliases` is a set; its order carries no meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub gender: Gender,
    pub category: ActorCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blacklisted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ActorRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, now: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            aliases: Vec::new(),
            gender: Gender::Unknown,
            category: ActorCategory::Unknown,
            blacklisted: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_blacklisted(&self) -> bool {
        self.blacklisted.unwrap_or(false)
    }
}

impl StoredEntity for ActorRecord {
    const KIND: EntityKind = EntityKind::Actor;

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
