use pretty_assertions::assert_eq;
use reelkeep_model::time::{day_key, is_valid_day_key, is_valid_month_key, month_key};
use reelkeep_model::{
    ActorCategory, ActorRecord, CatalogRecord, DailyAggregate, EntityKey, EntityKind, Gender,
    LinkCacheEntry, LogEntry, LogLevel, NewWork, NewWorkStatus, RecordStatus, StoredEntity,
};
use serde_json::json;

// ── Wire shape ───────────────────────────────────────────────────

#[test]
fn record_serializes_camel_case_and_skips_absent_options() {
    let r = CatalogRecord::new("ABC-123", "Title", RecordStatus::Want, 7).with_tags(["a"]);
    assert_eq!(
        serde_json::to_value(&r).unwrap(),
        json!({
            "id": "ABC-123",
            "title": "Title",
            "status": "want",
            "tags": ["a"],
            "createdAt": 7,
            "updatedAt": 7,
        })
    );
}

#[test]
fn actor_decodes_with_defaults() {
    let actor: ActorRecord = serde_json::from_value(json!({
        "id": "act-1",
        "name": "Ann",
        "gender": "female",
        "category": "western",
        "createdAt": 1,
        "updatedAt": 2,
    }))
    .unwrap();
    assert_eq!(actor.gender, Gender::Female);
    assert_eq!(actor.category, ActorCategory::Western);
    assert!(actor.aliases.is_empty());
    assert!(!actor.is_blacklisted());
}

#[test]
fn log_level_is_uppercase() {
    let entry = LogEntry::new(LogLevel::Warn, "slow", 5);
    let value = serde_json::to_value(&entry).unwrap();
    assert_eq!(value["level"], "WARN");
    assert!(value.get("id").is_none());
    assert_eq!(entry.key(), None);
}

// ── Keys and ordering ────────────────────────────────────────────

#[test]
fn link_cache_key_is_composite() {
    let entry = LinkCacheEntry::new("ABC-123", "mirror", "h1", 100).with_ttl(50);
    assert_eq!(entry.cache_key(), "ABC-123|mirror|h1");
    assert_eq!(entry.key(), Some(EntityKey::from("ABC-123|mirror|h1")));
    assert!(!entry.is_expired(149));
    assert!(entry.is_expired(150));
    assert!(!LinkCacheEntry::new("s", "src", "h", 0).is_expired(i64::MAX));
}

#[test]
fn status_priorities() {
    assert!(RecordStatus::Browsed < RecordStatus::Want);
    assert_eq!(RecordStatus::Want.max_priority(RecordStatus::Viewed), RecordStatus::Viewed);
    assert!(NewWorkStatus::New < NewWorkStatus::Browsed);
    assert_eq!(NewWorkStatus::from(RecordStatus::Want), NewWorkStatus::Want);
}

#[test]
fn entity_keys_round_trip_untagged() {
    assert_eq!(serde_json::to_value(EntityKey::Int(4)).unwrap(), json!(4));
    let key: EntityKey = serde_json::from_value(json!("ABC")).unwrap();
    assert_eq!(key, EntityKey::from("ABC"));
    assert_eq!(EntityKind::NewWork.to_string(), "new_work");
}

// ── Analytics and calendar keys ──────────────────────────────────

#[test]
fn daily_aggregate_bumps_and_seals() {
    let mut day = DailyAggregate::new("2024-05-02", 0);
    day.bump(["drama", "noir"]);
    day.bump(["drama"]);
    assert_eq!(day.total, 2);
    assert_eq!(day.tag_counts["drama"], 2);
    assert!(day.is_sealed("2024-05-03"));
    assert!(!day.is_sealed("2024-05-02"));
}

#[test]
fn calendar_keys() {
    // 2024-02-29T12:00:00Z
    let ts = 1_709_208_000_000;
    assert_eq!(day_key(ts), "2024-02-29");
    assert_eq!(month_key(ts), "2024-02");
    assert!(is_valid_day_key("2024-02-29"));
    assert!(!is_valid_day_key("2023-02-29"));
    assert!(!is_valid_day_key("2024-2-9"));
    assert!(is_valid_month_key("2024-12"));
    assert!(!is_valid_month_key("2024-13"));
}

#[test]
fn new_work_defaults_to_unread_new() {
    let work: NewWork = serde_json::from_value(json!({
        "id": "ABC-123",
        "actorId": "act-1",
        "title": "T",
        "discoveredAt": 10,
        "status": "new",
    }))
    .unwrap();
    assert!(!work.is_read);
    assert_eq!(work.status, NewWorkStatus::New);
    assert_eq!(work.created_at(), Some(10));
}
