use crate::kind::{EntityKey, EntityKind, StoredEntity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-day tag counters, keyed by `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    pub date: String,
    #[serde(default)]
    pub tag_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub total: u64,
    pub updated_at: i64,
}

impl DailyAggregate {
    pub fn new(date: impl Into<String>, now: i64) -> Self {
        Self {
            date: date.into(),
            tag_counts: BTreeMap::new(),
            total: 0,
            updated_at: now,
        }
    }

    /// A day's aggregate is frozen once that day has passed.
    /// Both keys are `YYYY-MM-DD`, so string order is calendar order.
    pub fn is_sealed(&self, today: &str) -> bool {
        self.date.as_str() < today
    }

    pub fn bump<'a, I>(&mut self, tags: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for tag in tags {
            *self.tag_counts.entry(tag.to_string()).or_default() += 1;
        }
        self.total += 1;
    }
}

impl StoredEntity for DailyAggregate {
    const KIND: EntityKind = EntityKind::DailyAggregate;

    fn key(&self) -> Option<EntityKey> {
        Some(EntityKey::Text(self.date.clone()))
    }

    fn updated_at(&self) -> Option<i64> {
        Some(self.updated_at)
    }

    fn set_updated_at(&mut self, ts: i64) {
        self.updated_at = ts;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Draft,
    Final,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Final => "final",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: i64,
    pub end: i64,
}

/// A monthly report produced by a scheduled job, keyed by `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub month: String,
    pub period: ReportPeriod,
    #[serde(default)]
    pub stats: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    pub status: ReportStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl StoredEntity for MonthlyReport {
    const KIND: EntityKind = EntityKind::MonthlyReport;

    fn key(&self) -> Option<EntityKey> {
        Some(EntityKey::Text(self.month.clone()))
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
