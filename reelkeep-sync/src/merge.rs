//! Conflict resolution.

use crate::diff::{DiffResult, Resolution};
use crate::reconcile::Reconcilable;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// How conflicts are settled when a backup is restored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    CloudPriority,
    LocalPriority,
    /// Follow each conflict's recommendation.
    #[default]
    Smart,
    /// Caller-supplied per-key resolutions; unlisted keys merge.
    Custom,
}

impl MergeStrategy {
    fn resolve(self, key: &str, recommended: Resolution, custom: &BTreeMap<String, Resolution>) -> Resolution {
        match self {
            Self::CloudPriority => Resolution::Cloud,
            Self::LocalPriority => Resolution::Local,
            Self::Smart => recommended,
            Self::Custom => custom.get(key).copied().unwrap_or(Resolution::Merge),
        }
    }
}

/// Per-kind merge counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    /// Cloud-only entries brought in.
    pub added: usize,
    /// Conflicts resolved to the cloud copy or a merge.
    pub updated: usize,
    /// Local entries left as they were.
    pub kept: usize,
    pub total: usize,
}

/// Result of merging one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct KindMerge<T> {
    pub merged: BTreeMap<String, T>,
    pub summary: MergeSummary,
    /// Keys whose merged value differs from what local already holds.
    pub changed_keys: BTreeSet<String>,
}

impl<T: Clone> KindMerge<T> {
    /// Merged values that need to be written back locally.
    pub fn changed(&self) -> Vec<T> {
        self.changed_keys
            .iter()
            .filter_map(|key| self.merged.get(key).cloned())
            .collect()
    }
}

/// Applies `strategy` to a diff and returns the merged snapshot for the kind.
///
/// Cloud-only entries are always added and local-only entries always kept.
pub fn merge_entities<T>(
    diff: &DiffResult<T>,
    strategy: MergeStrategy,
    custom: &BTreeMap<String, Resolution>,
    now: i64,
) -> KindMerge<T>
where
    T: Reconcilable + Clone,
{
    let mut merged = BTreeMap::new();
    let mut changed_keys = BTreeSet::new();
    let mut summary = MergeSummary::default();

    for (key, value) in &diff.local_only {
        merged.insert(key.clone(), value.clone());
        summary.kept += 1;
    }
    for (key, value) in &diff.identical {
        merged.insert(key.clone(), value.clone());
        summary.kept += 1;
    }
    for (key, value) in &diff.cloud_only {
        merged.insert(key.clone(), value.clone());
        changed_keys.insert(key.clone());
        summary.added += 1;
    }

    for conflict in &diff.conflicts {
        let resolution = strategy.resolve(&conflict.key, conflict.recommendation, custom);
        let value = match resolution {
            Resolution::Local => {
                summary.kept += 1;
                conflict.local.clone()
            }
            Resolution::Cloud => {
                summary.updated += 1;
                changed_keys.insert(conflict.key.clone());
                conflict.cloud.clone()
            }
            Resolution::Merge => {
                summary.updated += 1;
                changed_keys.insert(conflict.key.clone());
                T::merge(&conflict.local, &conflict.cloud, now)
            }
        };
        merged.insert(conflict.key.clone(), value);
    }

    summary.total = merged.len();
    debug!(
        kind = %T::KIND,
        ?strategy,
        added = summary.added,
        updated = summary.updated,
        kept = summary.kept,
        "Merged kind"
    );

    KindMerge {
        merged,
        summary,
        changed_keys,
    }
}
