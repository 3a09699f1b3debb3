//! Backup reconciliation for Reelkeep.
//!
//! A restore compares the local store against a decoded cloud backup:
//!
//! 1. both sides become a [`BackupSnapshot`] (local via [`export_snapshot`],
//!    cloud via [`BackupSnapshot::from_json`], which skips bad entries)
//! 2. [`diff_entities`] classifies each key per kind and recommends a
//!    [`Resolution`] for every conflict
//! 3. [`merge_entities`] applies a [`MergeStrategy`]
//! 4. [`apply_restore`] writes the changed entries back through the
//!    caller's [`Catalog`](reelkeep_storage::Catalog)
//!
//! Steps 1 to 3 are pure. Transport of the backup blob lives elsewhere.

mod diff;
mod error;
mod merge;
mod reconcile;
mod restore;
mod snapshot;

pub use diff::{Conflict, DiffResult, Resolution, SnapshotDiff, diff_entities, diff_snapshots, recommend};
pub use error::{SyncError, SyncResult};
pub use merge::{KindMerge, MergeStrategy, MergeSummary, merge_entities};
pub use reconcile::Reconcilable;
pub use restore::{
    LogMerge, MergeOptions, RestoreCategories, RestorePlan, RestoreReport, apply_restore,
    plan_restore, restore_from_backup,
};
pub use snapshot::{BackupSnapshot, ImportOutcome, SNAPSHOT_VERSION, export_snapshot};
