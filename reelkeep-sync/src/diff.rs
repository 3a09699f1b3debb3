//! Snapshot diffing.
//!
//! Classifies every key of `local ∪ cloud` into exactly one bucket. The
//! engine is pure: same inputs, same output, no clock and no I/O.

use crate::reconcile::Reconcilable;
use crate::snapshot::BackupSnapshot;
use reelkeep_model::{ActorRecord, CatalogRecord, DailyAggregate, MonthlyReport, NewWork};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a single conflict should be settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Local,
    Cloud,
    Merge,
}

/// A key present on both sides with differing content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict<T> {
    pub key: String,
    pub local: T,
    pub cloud: T,
    /// JSON names of the differing fields, in comparator order.
    pub differences: Vec<String>,
    pub recommendation: Resolution,
}

/// Per-kind classification of two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult<T> {
    pub cloud_only: BTreeMap<String, T>,
    pub local_only: BTreeMap<String, T>,
    /// Sorted by key.
    pub conflicts: Vec<Conflict<T>>,
    pub identical: BTreeMap<String, T>,
}

impl<T> Default for DiffResult<T> {
    fn default() -> Self {
        Self {
            cloud_only: BTreeMap::new(),
            local_only: BTreeMap::new(),
            conflicts: Vec::new(),
            identical: BTreeMap::new(),
        }
    }
}

impl<T> DiffResult<T> {
    /// Number of distinct keys across both sides.
    pub fn total_keys(&self) -> usize {
        self.cloud_only.len() + self.local_only.len() + self.conflicts.len() + self.identical.len()
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Recommends a resolution for one conflicting pair.
///
/// A pure revision bump goes to the newer side. A change confined to
/// set-valued fields is merged. Otherwise the cloud copy is taken only when
/// it is both strictly newer and strictly richer.
pub fn recommend<T: Reconcilable>(local: &T, cloud: &T, differences: &[&str]) -> Resolution {
    if differences.len() == 1 && differences[0] == T::REVISION_FIELD {
        return if cloud.revision() > local.revision() {
            Resolution::Cloud
        } else {
            Resolution::Local
        };
    }

    let content: Vec<&str> = differences
        .iter()
        .copied()
        .filter(|f| *f != T::REVISION_FIELD)
        .collect();
    if !content.is_empty() && content.iter().all(|f| T::MULTI_FIELDS.iter().any(|m| *m == *f)) {
        return Resolution::Merge;
    }

    if cloud.revision() > local.revision() && cloud.richer_than(local) {
        Resolution::Cloud
    } else {
        Resolution::Merge
    }
}

/// Diffs one kind. Both maps are keyed by primary key.
pub fn diff_entities<T>(local: &BTreeMap<String, T>, cloud: &BTreeMap<String, T>) -> DiffResult<T>
where
    T: Reconcilable + Clone,
{
    let mut result = DiffResult::default();

    for (key, local_value) in local {
        let Some(cloud_value) = cloud.get(key) else {
            result.local_only.insert(key.clone(), local_value.clone());
            continue;
        };

        let differences = local_value.differences(cloud_value);
        if differences.is_empty() {
            result.identical.insert(key.clone(), local_value.clone());
            continue;
        }

        let recommendation = recommend(local_value, cloud_value, &differences);
        result.conflicts.push(Conflict {
            key: key.clone(),
            local: local_value.clone(),
            cloud: cloud_value.clone(),
            differences: differences.into_iter().map(str::to_string).collect(),
            recommendation,
        });
    }

    for (key, cloud_value) in cloud {
        if !local.contains_key(key) {
            result.cloud_only.insert(key.clone(), cloud_value.clone());
        }
    }

    result
}

/// Diff of every reconcilable kind in two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDiff {
    pub records: DiffResult<CatalogRecord>,
    pub actors: DiffResult<ActorRecord>,
    pub new_works: DiffResult<NewWork>,
    pub daily_stats: DiffResult<DailyAggregate>,
    pub monthly_reports: DiffResult<MonthlyReport>,
}

impl SnapshotDiff {
    pub fn conflict_count(&self) -> usize {
        self.records.conflicts.len()
            + self.actors.conflicts.len()
            + self.new_works.conflicts.len()
            + self.daily_stats.conflicts.len()
            + self.monthly_reports.conflicts.len()
    }
}

pub fn diff_snapshots(local: &BackupSnapshot, cloud: &BackupSnapshot) -> SnapshotDiff {
    SnapshotDiff {
        records: diff_entities(&local.records, &cloud.records),
        actors: diff_entities(&local.actors, &cloud.actors),
        new_works: diff_entities(&local.new_works, &cloud.new_works),
        daily_stats: diff_entities(&local.daily_stats, &cloud.daily_stats),
        monthly_reports: diff_entities(&local.monthly_reports, &cloud.monthly_reports),
    }
}
