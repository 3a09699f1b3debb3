//! Per-kind field comparison and merge rules.

use reelkeep_model::{
    ActorCategory, ActorRecord, CatalogRecord, DailyAggregate, Gender, MonthlyReport, NewWork,
    ReportStatus, StoredEntity,
};
use std::collections::BTreeSet;

/// An entity kind that can be diffed and merged against its cloud copy.
pub trait Reconcilable: StoredEntity {
    /// JSON name of the field that orders revisions.
    const REVISION_FIELD: &'static str;

    /// JSON names of set-valued fields.
    const MULTI_FIELDS: &'static [&'static str] = &[];

    fn revision(&self) -> i64;

    /// Names of the compared fields that differ, in a fixed order.
    fn differences(&self, other: &Self) -> Vec<&'static str>;

    /// True if `self` carries strictly more information than `other`.
    fn richer_than(&self, other: &Self) -> bool;

    /// Field-wise merge of two copies of one entity, stamped at `now`.
    fn merge(local: &Self, cloud: &Self, now: i64) -> Self;
}

/// Which side's scalars win: the more recent one, local on ties.
fn preferred<'a, T: Reconcilable>(local: &'a T, cloud: &'a T) -> (&'a T, &'a T) {
    if cloud.revision() > local.revision() {
        (cloud, local)
    } else {
        (local, cloud)
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !is_blank(s))
}

fn pick_text(preferred: &str, other: &str) -> String {
    let chosen = if is_blank(preferred) { other } else { preferred };
    chosen.to_string()
}

fn pick_opt(preferred: &Option<String>, other: &Option<String>) -> Option<String> {
    if filled(preferred) {
        preferred.clone()
    } else if filled(other) {
        other.clone()
    } else {
        None
    }
}

fn as_set(values: &[String]) -> BTreeSet<&str> {
    values.iter().map(String::as_str).collect()
}

fn same_set(a: &[String], b: &[String]) -> bool {
    as_set(a) == as_set(b)
}

/// Local order first, then values only the cloud has.
fn union(local: &[String], cloud: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    local
        .iter()
        .chain(cloud)
        .filter(|v| seen.insert(v.as_str()))
        .cloned()
        .collect()
}

impl Reconcilable for CatalogRecord {
    const REVISION_FIELD: &'static str = "updatedAt";
    const MULTI_FIELDS: &'static [&'static str] = &["tags"];

    fn revision(&self) -> i64 {
        self.updated_at
    }

    fn differences(&self, other: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title != other.title {
            fields.push("title");
        }
        if self.status != other.status {
            fields.push("status");
        }
        if self.release_date != other.release_date {
            fields.push("releaseDate");
        }
        if self.source_url != other.source_url {
            fields.push("sourceUrl");
        }
        if self.cover_image != other.cover_image {
            fields.push("coverImage");
        }
        if !same_set(&self.tags, &other.tags) {
            fields.push("tags");
        }
        if self.updated_at != other.updated_at {
            fields.push("updatedAt");
        }
        fields
    }

    fn richer_than(&self, other: &Self) -> bool {
        self.title.chars().count() > other.title.chars().count()
            || as_set(&self.tags).len() > as_set(&other.tags).len()
            || (filled(&self.release_date) && !filled(&other.release_date))
            || (filled(&self.source_url) && !filled(&other.source_url))
            || (filled(&self.cover_image) && !filled(&other.cover_image))
    }

    fn merge(local: &Self, cloud: &Self, now: i64) -> Self {
        let (pref, other) = preferred(local, cloud);
        Self {
            id: local.id.clone(),
            title: pick_text(&pref.title, &other.title),
            status: local.status.max_priority(cloud.status),
            tags: union(&local.tags, &cloud.tags),
            created_at: local.created_at.min(cloud.created_at),
            updated_at: now,
            release_date: pick_opt(&pref.release_date, &other.release_date),
            source_url: pick_opt(&pref.source_url, &other.source_url),
            cover_image: pick_opt(&pref.cover_image, &other.cover_image),
        }
    }
}

impl Reconcilable for ActorRecord {
    const REVISION_FIELD: &'static str = "updatedAt";
    const MULTI_FIELDS: &'static [&'static str] = &["aliases"];

    fn revision(&self) -> i64 {
        self.updated_at
    }

    fn differences(&self, other: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name != other.name {
            fields.push("name");
        }
        if !same_set(&self.aliases, &other.aliases) {
            fields.push("aliases");
        }
        if self.gender != other.gender {
            fields.push("gender");
        }
        if self.category != other.category {
            fields.push("category");
        }
        if self.blacklisted != other.blacklisted {
            fields.push("blacklisted");
        }
        if self.avatar_url != other.avatar_url {
            fields.push("avatarUrl");
        }
        if self.updated_at != other.updated_at {
            fields.push("updatedAt");
        }
        fields
    }

    fn richer_than(&self, other: &Self) -> bool {
        self.name.chars().count() > other.name.chars().count()
            || as_set(&self.aliases).len() > as_set(&other.aliases).len()
            || (filled(&self.avatar_url) && !filled(&other.avatar_url))
            || (self.gender != Gender::Unknown && other.gender == Gender::Unknown)
            || (self.category != ActorCategory::Unknown && other.category == ActorCategory::Unknown)
            || (self.blacklisted.is_some() && other.blacklisted.is_none())
    }

    fn merge(local: &Self, cloud: &Self, now: i64) -> Self {
        let (pref, other) = preferred(local, cloud);
        let blacklisted = if local.is_blacklisted() || cloud.is_blacklisted() {
            Some(true)
        } else {
            pref.blacklisted.or(other.blacklisted)
        };
        Self {
            id: local.id.clone(),
            name: pick_text(&pref.name, &other.name),
            aliases: union(&local.aliases, &cloud.aliases),
            gender: if pref.gender == Gender::Unknown { other.gender } else { pref.gender },
            category: if pref.category == ActorCategory::Unknown {
                other.category
            } else {
                pref.category
            },
            blacklisted,
            avatar_url: pick_opt(&pref.avatar_url, &other.avatar_url),
            created_at: local.created_at.min(cloud.created_at),
            updated_at: now,
        }
    }
}

impl Reconcilable for NewWork {
    const REVISION_FIELD: &'static str = "discoveredAt";

    fn revision(&self) -> i64 {
        self.discovered_at
    }

    fn differences(&self, other: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.actor_id != other.actor_id {
            fields.push("actorId");
        }
        if self.title != other.title {
            fields.push("title");
        }
        if self.is_read != other.is_read {
            fields.push("isRead");
        }
        if self.status != other.status {
            fields.push("status");
        }
        if self.discovered_at != other.discovered_at {
            fields.push("discoveredAt");
        }
        fields
    }

    fn richer_than(&self, other: &Self) -> bool {
        self.title.chars().count() > other.title.chars().count()
            || (self.is_read && !other.is_read)
            || self.status > other.status
    }

    /// Discovery events keep their earliest sighting; there is no merge stamp.
    fn merge(local: &Self, cloud: &Self, _now: i64) -> Self {
        let (pref, other) = preferred(local, cloud);
        Self {
            id: local.id.clone(),
            actor_id: pick_text(&pref.actor_id, &other.actor_id),
            title: pick_text(&pref.title, &other.title),
            discovered_at: local.discovered_at.min(cloud.discovered_at),
            is_read: local.is_read || cloud.is_read,
            status: local.status.max(cloud.status),
        }
    }
}

impl Reconcilable for DailyAggregate {
    const REVISION_FIELD: &'static str = "updatedAt";

    fn revision(&self) -> i64 {
        self.updated_at
    }

    fn differences(&self, other: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.tag_counts != other.tag_counts {
            fields.push("tagCounts");
        }
        if self.total != other.total {
            fields.push("total");
        }
        if self.updated_at != other.updated_at {
            fields.push("updatedAt");
        }
        fields
    }

    fn richer_than(&self, other: &Self) -> bool {
        self.total > other.total || self.tag_counts.len() > other.tag_counts.len()
    }

    fn merge(local: &Self, cloud: &Self, now: i64) -> Self {
        let mut tag_counts = local.tag_counts.clone();
        for (tag, count) in &cloud.tag_counts {
            let entry = tag_counts.entry(tag.clone()).or_default();
            *entry = (*entry).max(*count);
        }
        Self {
            date: local.date.clone(),
            tag_counts,
            total: local.total.max(cloud.total),
            updated_at: now,
        }
    }
}

impl Reconcilable for MonthlyReport {
    const REVISION_FIELD: &'static str = "updatedAt";

    fn revision(&self) -> i64 {
        self.updated_at
    }

    fn differences(&self, other: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.period != other.period {
            fields.push("period");
        }
        if self.stats != other.stats {
            fields.push("stats");
        }
        if self.payload != other.payload {
            fields.push("payload");
        }
        if self.status != other.status {
            fields.push("status");
        }
        if self.updated_at != other.updated_at {
            fields.push("updatedAt");
        }
        fields
    }

    fn richer_than(&self, other: &Self) -> bool {
        (self.status == ReportStatus::Final && other.status == ReportStatus::Draft)
            || (filled(&self.payload) && !filled(&other.payload))
    }

    fn merge(local: &Self, cloud: &Self, now: i64) -> Self {
        let (source, other) = match (local.status, cloud.status) {
            (ReportStatus::Final, ReportStatus::Draft) => (local, cloud),
            (ReportStatus::Draft, ReportStatus::Final) => (cloud, local),
            _ => preferred(local, cloud),
        };
        Self {
            month: local.month.clone(),
            period: source.period.clone(),
            stats: source.stats.clone(),
            payload: pick_opt(&source.payload, &other.payload),
            status: source.status,
            created_at: local.created_at.min(cloud.created_at),
            updated_at: now,
        }
    }
}
