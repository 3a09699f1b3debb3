use proptest::prelude::*;
use reelkeep_model::{
    ActorCategory, ActorRecord, DailyAggregate, Gender, LinkCacheEntry, LogEntry, LogLevel,
    MonthlyReport, NewWork, NewWorkStatus, ReportPeriod, ReportStatus, StoredEntity,
};
use reelkeep_storage::{Database, EntityStore};
use serde_json::{Value, json};

/// Stores `entity` in an empty table and reads it back by its key.
fn put_then_get<T: StoredEntity>(store: &EntityStore<T>, entity: &T) -> (T, Option<T>) {
    let stored = store.put(entity).unwrap();
    let key = stored.key().expect("stored entity has a key");
    let fetched = store.get(key).unwrap();
    (stored, fetched)
}

fn key_text() -> impl Strategy<Value = String> {
    "[A-Za-z0-9-]{1,12}"
}

fn free_text() -> impl Strategy<Value = String> {
    "\\PC{0,16}"
}

fn optional_text() -> impl Strategy<Value = Option<String>> {
    prop::option::of(free_text())
}

fn json_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        free_text().prop_map(Value::String),
        (free_text(), any::<i32>()).prop_map(|(k, v)| {
            let mut map = serde_json::Map::new();
            map.insert("list".to_string(), json!([v, null]));
            map.insert(k, json!(v));
            Value::Object(map)
        }),
    ]
}

fn gender() -> impl Strategy<Value = Gender> {
    prop_oneof![Just(Gender::Female), Just(Gender::Male), Just(Gender::Unknown)]
}

fn category() -> impl Strategy<Value = ActorCategory> {
    prop_oneof![
        Just(ActorCategory::Censored),
        Just(ActorCategory::Uncensored),
        Just(ActorCategory::Western),
        Just(ActorCategory::Unknown),
    ]
}

fn level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Debug),
        Just(LogLevel::Info),
        Just(LogLevel::Warn),
        Just(LogLevel::Error),
    ]
}

fn new_work_status() -> impl Strategy<Value = NewWorkStatus> {
    prop_oneof![
        Just(NewWorkStatus::New),
        Just(NewWorkStatus::Browsed),
        Just(NewWorkStatus::Want),
        Just(NewWorkStatus::Viewed),
    ]
}

// ── Log data edge cases ──────────────────────────────────────────

#[test]
fn log_data_null_is_kept_distinct_from_absent() {
    let db = Database::open_in_memory().unwrap();

    let with_null = LogEntry::new(LogLevel::Info, "null payload", 1).with_data(Value::Null);
    let (stored, fetched) = put_then_get(&db.logs(), &with_null);
    assert_eq!(stored.data, Some(Value::Null));
    assert_eq!(fetched, Some(stored));

    let absent = LogEntry::new(LogLevel::Info, "no payload", 2);
    let (stored, fetched) = put_then_get(&db.logs(), &absent);
    assert_eq!(stored.data, None);
    assert_eq!(fetched, Some(stored));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn actors_round_trip(
        id in key_text(),
        name in free_text(),
        aliases in prop::collection::vec(free_text(), 0..4),
        gender in gender(),
        category in category(),
        blacklisted in prop::option::of(any::<bool>()),
        avatar_url in optional_text(),
        ts in 0i64..1_000_000,
    ) {
        let db = Database::open_in_memory().unwrap();
        let mut actor = ActorRecord::new(id, name, ts);
        actor.aliases = aliases;
        actor.gender = gender;
        actor.category = category;
        actor.blacklisted = blacklisted;
        actor.avatar_url = avatar_url;

        let (stored, fetched) = put_then_get(&db.actors(), &actor);
        prop_assert_eq!(&stored, &actor);
        prop_assert_eq!(fetched, Some(actor));
    }

    #[test]
    fn log_entries_round_trip(
        level in level(),
        message in free_text(),
        data in prop::option::of(json_value()),
        ts in 0i64..1_000_000,
    ) {
        let db = Database::open_in_memory().unwrap();
        let mut entry = LogEntry::new(level, message, ts);
        entry.data = data;

        let (stored, fetched) = put_then_get(&db.logs(), &entry);
        prop_assert_eq!(stored.key().and_then(|k| k.as_int()), stored.id);
        prop_assert_eq!(&stored.data, &entry.data);
        prop_assert_eq!(fetched, Some(stored));
    }

    #[test]
    fn new_works_round_trip(
        id in key_text(),
        actor_id in key_text(),
        title in free_text(),
        is_read in any::<bool>(),
        status in new_work_status(),
        discovered_at in 0i64..1_000_000,
    ) {
        let db = Database::open_in_memory().unwrap();
        let mut work = NewWork::new(id, actor_id, title, discovered_at);
        work.is_read = is_read;
        work.status = status;

        let (stored, fetched) = put_then_get(&db.new_works(), &work);
        prop_assert_eq!(&stored, &work);
        prop_assert_eq!(fetched, Some(work));
    }

    #[test]
    fn link_cache_entries_round_trip(
        subject in key_text(),
        source in key_text(),
        hash in key_text(),
        links in prop::collection::vec(free_text(), 0..4),
        created_at in 0i64..1_000_000,
        ttl in prop::option::of(1i64..100_000),
    ) {
        let db = Database::open_in_memory().unwrap();
        let mut entry = LinkCacheEntry::new(subject, source, hash, created_at);
        entry.links = links;
        if let Some(ttl) = ttl {
            entry = entry.with_ttl(ttl);
        }

        let (stored, fetched) = put_then_get(&db.link_cache(), &entry);
        prop_assert_eq!(&stored, &entry);
        prop_assert_eq!(fetched, Some(entry));
    }

    #[test]
    fn daily_aggregates_round_trip(
        day in 1u32..29,
        tags in prop::collection::vec(prop::sample::select(vec!["drama", "noir", "comedy"]), 0..6),
        ts in 0i64..1_000_000,
    ) {
        let db = Database::open_in_memory().unwrap();
        let mut aggregate = DailyAggregate::new(format!("2024-05-{day:02}"), ts);
        for tag in &tags {
            aggregate.bump([*tag]);
        }

        let (stored, fetched) = put_then_get(&db.daily_stats(), &aggregate);
        prop_assert_eq!(&stored, &aggregate);
        prop_assert_eq!(fetched, Some(aggregate));
    }

    #[test]
    fn monthly_reports_round_trip(
        month in 1u32..13,
        stats in json_value(),
        payload in optional_text(),
        is_final in any::<bool>(),
        ts in 0i64..1_000_000,
    ) {
        let db = Database::open_in_memory().unwrap();
        let report = MonthlyReport {
            month: format!("2023-{month:02}"),
            period: ReportPeriod { start: ts, end: ts + 1_000 },
            stats,
            payload,
            status: if is_final { ReportStatus::Final } else { ReportStatus::Draft },
            created_at: ts,
            updated_at: ts,
        };

        let (stored, fetched) = put_then_get(&db.monthly_reports(), &report);
        prop_assert_eq!(&stored, &report);
        prop_assert_eq!(fetched, Some(report));
    }
}
