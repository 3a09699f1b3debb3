//! Restoring a cloud backup into the local store.
//!
//! Planning is pure and works on two snapshots. Applying a plan writes only
//! the entries whose merged value differs from what local already holds,
//! one `bulk_put` per kind.

use crate::diff::{Resolution, diff_entities};
use crate::error::SyncResult;
use crate::merge::{KindMerge, MergeStrategy, MergeSummary, merge_entities};
use crate::reconcile::Reconcilable;
use crate::snapshot::{BackupSnapshot, export_snapshot};
use reelkeep_model::{
    ActorRecord, CatalogRecord, DailyAggregate, EntityKind, LogEntry, MonthlyReport, NewWork,
};
use reelkeep_storage::{Catalog, Database, EntityStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Which kinds a restore touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestoreCategories {
    pub records: bool,
    pub actors: bool,
    pub new_works: bool,
    pub daily_stats: bool,
    pub monthly_reports: bool,
    pub logs: bool,
}

impl Default for RestoreCategories {
    fn default() -> Self {
        Self {
            records: true,
            actors: true,
            new_works: true,
            daily_stats: true,
            monthly_reports: true,
            logs: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergeOptions {
    pub strategy: MergeStrategy,
    pub categories: RestoreCategories,
    /// Per-key resolutions for [`MergeStrategy::Custom`]. A key applies to
    /// every kind that has an entry under it.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_conflict_resolutions: BTreeMap<String, Resolution>,
}

impl MergeOptions {
    pub fn with_strategy(strategy: MergeStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }
}

/// Cloud log lines missing locally.
///
/// Logs are append-only, so they are never diffed field by field. A cloud
/// line is new when no local line has the same timestamp and message.
#[derive(Debug, Clone, PartialEq)]
pub struct LogMerge {
    pub appended: Vec<LogEntry>,
    pub summary: MergeSummary,
}

/// The merged result of every enabled category. `None` means disabled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestorePlan {
    pub records: Option<KindMerge<CatalogRecord>>,
    pub actors: Option<KindMerge<ActorRecord>>,
    pub new_works: Option<KindMerge<NewWork>>,
    pub daily_stats: Option<KindMerge<DailyAggregate>>,
    pub monthly_reports: Option<KindMerge<MonthlyReport>>,
    pub logs: Option<LogMerge>,
}

impl RestorePlan {
    pub fn summaries(&self) -> BTreeMap<EntityKind, MergeSummary> {
        let mut out: BTreeMap<EntityKind, MergeSummary> = BTreeMap::new();
        let mut add = |kind: EntityKind, summary: Option<MergeSummary>| {
            if let Some(summary) = summary {
                out.insert(kind, summary);
            }
        };
        add(EntityKind::Record, self.records.as_ref().map(|m| m.summary));
        add(EntityKind::Actor, self.actors.as_ref().map(|m| m.summary));
        add(EntityKind::NewWork, self.new_works.as_ref().map(|m| m.summary));
        add(EntityKind::DailyAggregate, self.daily_stats.as_ref().map(|m| m.summary));
        add(EntityKind::MonthlyReport, self.monthly_reports.as_ref().map(|m| m.summary));
        add(EntityKind::LogEntry, self.logs.as_ref().map(|m| m.summary));
        out
    }
}

/// Outcome of applying a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub summaries: BTreeMap<EntityKind, MergeSummary>,
    /// Entities written per kind.
    pub written: BTreeMap<EntityKind, usize>,
    pub reconciled_new_works: usize,
    /// Import skips, filled in by [`restore_from_backup`].
    pub skipped: BTreeMap<EntityKind, usize>,
}

fn plan_kind<T: Reconcilable>(
    enabled: bool,
    local: &BTreeMap<String, T>,
    cloud: &BTreeMap<String, T>,
    options: &MergeOptions,
    now: i64,
) -> Option<KindMerge<T>> {
    enabled.then(|| {
        let diff = diff_entities(local, cloud);
        merge_entities(&diff, options.strategy, &options.custom_conflict_resolutions, now)
    })
}

fn plan_logs(local: &[LogEntry], cloud: &[LogEntry]) -> LogMerge {
    let mut seen: BTreeSet<(i64, &str)> = local
        .iter()
        .map(|entry| (entry.timestamp_ms, entry.message.as_str()))
        .collect();
    let mut appended = Vec::new();
    for entry in cloud {
        if seen.insert((entry.timestamp_ms, entry.message.as_str())) {
            let mut fresh = entry.clone();
            fresh.id = None;
            appended.push(fresh);
        }
    }
    let summary = MergeSummary {
        added: appended.len(),
        updated: 0,
        kept: local.len(),
        total: local.len() + appended.len(),
    };
    LogMerge { appended, summary }
}

/// Computes what a restore would write, without touching the store.
pub fn plan_restore(
    local: &BackupSnapshot,
    cloud: &BackupSnapshot,
    options: &MergeOptions,
    now: i64,
) -> RestorePlan {
    let categories = &options.categories;
    RestorePlan {
        records: plan_kind(categories.records, &local.records, &cloud.records, options, now),
        actors: plan_kind(categories.actors, &local.actors, &cloud.actors, options, now),
        new_works: plan_kind(categories.new_works, &local.new_works, &cloud.new_works, options, now),
        daily_stats: plan_kind(categories.daily_stats, &local.daily_stats, &cloud.daily_stats, options, now),
        monthly_reports: plan_kind(
            categories.monthly_reports,
            &local.monthly_reports,
            &cloud.monthly_reports,
            options,
            now,
        ),
        logs: categories.logs.then(|| plan_logs(&local.logs, &cloud.logs)),
    }
}

fn write_kind<T: Reconcilable>(
    store: EntityStore<T>,
    merge: Option<&KindMerge<T>>,
    written: &mut BTreeMap<EntityKind, usize>,
) -> SyncResult<()> {
    let Some(merge) = merge else {
        return Ok(());
    };
    let changed = merge.changed();
    store.bulk_put(&changed)?;
    written.insert(T::KIND, changed.len());
    Ok(())
}

fn write_plan(db: &Database, plan: &RestorePlan) -> SyncResult<BTreeMap<EntityKind, usize>> {
    let mut written = BTreeMap::new();
    write_kind(db.records(), plan.records.as_ref(), &mut written)?;
    write_kind(db.actors(), plan.actors.as_ref(), &mut written)?;
    write_kind(db.new_works(), plan.new_works.as_ref(), &mut written)?;
    write_kind(db.daily_stats(), plan.daily_stats.as_ref(), &mut written)?;
    write_kind(db.monthly_reports(), plan.monthly_reports.as_ref(), &mut written)?;
    if let Some(logs) = &plan.logs {
        db.logs().bulk_put(&logs.appended)?;
        written.insert(EntityKind::LogEntry, logs.appended.len());
    }
    Ok(written)
}

/// Writes a plan back through `catalog`'s store.
///
/// The writes hold the catalog's write-queue turn. Each kind commits on its
/// own; a failure part way leaves earlier kinds written. Discovery events
/// are re-derived from records afterwards, in a turn of their own.
pub async fn apply_restore(catalog: &Catalog, plan: &RestorePlan) -> SyncResult<RestoreReport> {
    let db = catalog.database();
    let written = catalog.queue().exclusive(|| write_plan(db, plan)).await?;
    let reconciled_new_works = catalog.reconcile_new_works().await?;

    let report = RestoreReport {
        summaries: plan.summaries(),
        written,
        reconciled_new_works,
        skipped: BTreeMap::new(),
    };
    info!(written = ?report.written, reconciled_new_works, "Restore applied");
    Ok(report)
}

/// Restores a decoded cloud backup blob into `catalog`'s store.
pub async fn restore_from_backup(
    catalog: &Catalog,
    backup: &Value,
    options: &MergeOptions,
    now: i64,
) -> SyncResult<RestoreReport> {
    let local = export_snapshot(catalog.database(), options.categories.logs)?;
    let imported = BackupSnapshot::from_json(backup)?;
    if imported.total_skipped() > 0 {
        warn!(skipped = imported.total_skipped(), "Restoring with skipped entries");
    }

    let plan = plan_restore(&local, &imported.snapshot, options, now);
    let mut report = apply_restore(catalog, &plan).await?;
    report.skipped = imported.skipped;
    Ok(report)
}
