use pretty_assertions::assert_eq;
use reelkeep_model::{
    ActorRecord, CatalogRecord, EntityKind, LogEntry, LogLevel, NewWork, NewWorkStatus, RecordStatus,
};
use reelkeep_storage::{Catalog, Database, WriteQueue};
use reelkeep_sync::{
    BackupSnapshot, MergeOptions, MergeStrategy, MergeSummary, RestoreCategories, SyncError,
    apply_restore, export_snapshot, plan_restore, restore_from_backup,
};
use serde_json::json;

const NOW: i64 = 1_700_000_000_000;

// ── Import ───────────────────────────────────────────────────────

#[test]
fn import_skips_and_counts_bad_entries() {
    let backup = json!({
        "version": 1,
        "exportedAt": 42,
        "records": {
            "ABC-123": {"id": "ABC-123", "title": "T", "status": "want", "createdAt": 1, "updatedAt": 2},
            "broken": {"id": "broken", "title": "T", "status": "unknown-status", "createdAt": 1, "updatedAt": 2},
            "blank": {"id": "  ", "title": "T", "status": "want", "createdAt": 1, "updatedAt": 2},
        },
        "dailyStats": [
            {"date": "2024-05-02", "tagCounts": {"drama": 1}, "total": 1, "updatedAt": 5},
            {"date": "2024-5-2", "tagCounts": {}, "total": 0, "updatedAt": 5},
        ],
        "actors": "not a section",
    });

    let outcome = BackupSnapshot::from_json(&backup).unwrap();
    assert_eq!(outcome.snapshot.exported_at, 42);
    assert_eq!(outcome.snapshot.records.keys().collect::<Vec<_>>(), vec!["ABC-123"]);
    assert_eq!(outcome.snapshot.daily_stats.len(), 1);
    assert!(outcome.snapshot.actors.is_empty());

    assert_eq!(outcome.skipped.get(&EntityKind::Record), Some(&2));
    assert_eq!(outcome.skipped.get(&EntityKind::DailyAggregate), Some(&1));
    assert_eq!(outcome.skipped.get(&EntityKind::Actor), Some(&1));
    assert_eq!(outcome.total_skipped(), 4);
}

#[test]
fn import_rejects_non_object_top_level() {
    let err = BackupSnapshot::from_json(&json!([1, 2, 3])).unwrap_err();
    assert!(matches!(err, SyncError::InvalidSnapshot(_)));
}

#[test]
fn exported_snapshot_imports_cleanly() {
    let db = Database::open_in_memory().unwrap();
    db.records()
        .put(&CatalogRecord::new("ABC-123", "T", RecordStatus::Want, 10).with_tags(["a"]))
        .unwrap();
    db.actors().put(&ActorRecord::new("act-1", "Ann", 10)).unwrap();
    db.logs().put(&LogEntry::new(LogLevel::Info, "hello", 10)).unwrap();

    let snapshot = export_snapshot(&db, true).unwrap();
    assert_eq!(snapshot.logs.len(), 1);

    let outcome = BackupSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
    assert_eq!(outcome.total_skipped(), 0);
    assert_eq!(outcome.snapshot, snapshot);

    let without_logs = export_snapshot(&db, false).unwrap();
    assert!(without_logs.logs.is_empty());
}

// ── Restore ──────────────────────────────────────────────────────

fn seeded_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.records()
        .put(&CatalogRecord::new("ABC-123", "Title", RecordStatus::Want, 100).with_tags(["a"]))
        .unwrap();
    db.new_works().put(&NewWork::new("ABC-123", "act-1", "Title", 50)).unwrap();
    db.logs().put(&LogEntry::new(LogLevel::Info, "local line", 7)).unwrap();
    db
}

fn catalog_for(db: &Database) -> Catalog {
    Catalog::new(db.clone(), WriteQueue::default())
}

fn cloud_backup() -> serde_json::Value {
    json!({
        "version": 1,
        "exportedAt": 300,
        "records": {
            "ABC-123": {"id": "ABC-123", "title": "Title", "status": "viewed", "tags": ["b"], "createdAt": 100, "updatedAt": 200},
            "XYZ-999": {"id": "XYZ-999", "title": "Other", "status": "browsed", "createdAt": 150, "updatedAt": 150},
        },
        "actors": [
            {"id": "act-1", "name": "Ann", "gender": "female", "category": "western", "createdAt": 1, "updatedAt": 1},
        ],
        "logs": [
            {"id": 99, "level": "INFO", "message": "local line", "timestampMs": 7},
            {"id": 100, "level": "WARN", "message": "cloud line", "timestampMs": 8},
        ],
    })
}

#[tokio::test]
async fn restore_merges_writes_and_reconciles() {
    let db = seeded_db();
    let report = restore_from_backup(&catalog_for(&db), &cloud_backup(), &MergeOptions::default(), NOW)
        .await
        .unwrap();

    assert_eq!(
        report.summaries[&EntityKind::Record],
        MergeSummary {
            added: 1,
            updated: 1,
            kept: 0,
            total: 2,
        }
    );
    assert_eq!(report.written[&EntityKind::Record], 2);
    assert_eq!(report.written[&EntityKind::Actor], 1);
    assert!(!report.summaries.contains_key(&EntityKind::LogEntry));
    assert!(report.skipped.is_empty());

    let record = db.records().get("ABC-123").unwrap().unwrap();
    assert_eq!(record.status, RecordStatus::Viewed);
    assert_eq!(record.tags, vec!["a", "b"]);
    assert_eq!(record.updated_at, NOW);
    assert!(db.records().get("XYZ-999").unwrap().is_some());

    // Discovery events follow the merged record status.
    assert_eq!(report.reconciled_new_works, 1);
    let work = db.new_works().get("ABC-123").unwrap().unwrap();
    assert_eq!(work.status, NewWorkStatus::Viewed);

    assert_eq!(db.logs().count_all().unwrap(), 1);
}

#[tokio::test]
async fn disabled_categories_are_not_planned() {
    let db = seeded_db();
    let local = export_snapshot(&db, false).unwrap();
    let cloud = BackupSnapshot::from_json(&cloud_backup()).unwrap().snapshot;

    let options = MergeOptions {
        categories: RestoreCategories {
            actors: false,
            ..RestoreCategories::default()
        },
        ..MergeOptions::with_strategy(MergeStrategy::LocalPriority)
    };
    let plan = plan_restore(&local, &cloud, &options, NOW);
    assert!(plan.actors.is_none());
    assert!(plan.logs.is_none());

    let report = apply_restore(&catalog_for(&db), &plan).await.unwrap();
    assert_eq!(db.actors().count_all().unwrap(), 0);
    assert_eq!(report.written[&EntityKind::Record], 1);
    let record = db.records().get("ABC-123").unwrap().unwrap();
    assert_eq!(record.status, RecordStatus::Want);
}

#[tokio::test]
async fn log_restore_appends_unseen_lines() {
    let db = seeded_db();
    let options = MergeOptions {
        categories: RestoreCategories {
            logs: true,
            ..RestoreCategories::default()
        },
        ..MergeOptions::default()
    };

    let report = restore_from_backup(&catalog_for(&db), &cloud_backup(), &options, NOW)
        .await
        .unwrap();
    assert_eq!(report.written[&EntityKind::LogEntry], 1);
    assert_eq!(report.summaries[&EntityKind::LogEntry].total, 2);

    let messages: Vec<String> = db.logs().export_all().unwrap().into_iter().map(|e| e.message).collect();
    assert_eq!(messages, vec!["local line", "cloud line"]);
}

#[test]
fn options_deserialize_with_defaults() {
    let options: MergeOptions = serde_json::from_value(json!({
        "strategy": "custom",
        "categories": {"logs": true},
        "customConflictResolutions": {"ABC-123": "local"},
    }))
    .unwrap();
    assert_eq!(options.strategy, MergeStrategy::Custom);
    assert!(options.categories.logs);
    assert!(options.categories.records);
    assert_eq!(options.custom_conflict_resolutions.len(), 1);
}
