use crate::kind::{EntityKey, EntityKind, StoredEntity};
use crate::record::RecordStatus;
use serde::{Deserialize, Serialize};

/// Catalog state of a discovered work. `New` means no catalog record
/// exists under the same id yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewWorkStatus {
    New,
    Browsed,
    Want,
    Viewed,
}

impl NewWorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Browsed => "browsed",
            Self::Want => "want",
            Self::Viewed => "viewed",
        }
    }
}

impl From<RecordStatus> for NewWorkStatus {
    fn from(status: RecordStatus) -> Self {
        match status {
            RecordStatus::Browsed => Self::Browsed,
            RecordStatus::Want => Self::Want,
            RecordStatus::Viewed => Self::Viewed,
        }
    }
}

/// A work discovered for a subscribed actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWork {
    pub id: String,
    pub actor_id: String,
    pub title: String,
    pub discovered_at: i64,
    #[serde(default)]
    pub is_read: bool,
    pub status: NewWorkStatus,
}

impl NewWork {
    pub fn new(
        id: impl Into<String>,
        actor_id: impl Into<String>,
        title: impl Into<String>,
        discovered_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            actor_id: actor_id.into(),
            title: title.into(),
            discovered_at,
            is_read: false,
            status: NewWorkStatus::New,
        }
    }
}

impl StoredEntity for NewWork {
    const KIND: EntityKind = EntityKind::NewWork;

    fn key(&self) -> Option<EntityKey> {
        Some(EntityKey::Text(self.id.clone()))
    }

    fn created_at(&self) -> Option<i64> {
        Some(self.discovered_at)
    }

    fn set_created_at(&mut self, ts: i64) {
        self.discovered_at = ts;
    }
}
