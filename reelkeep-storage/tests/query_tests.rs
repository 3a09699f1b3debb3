use pretty_assertions::assert_eq;
use proptest::prelude::*;
use reelkeep_model::{ActorCategory, ActorRecord, CatalogRecord, LogEntry, LogLevel, RecordStatus};
use reelkeep_storage::{
    Database, Direction, KeyRange, Predicate, PredicateOperator, QuerySpec, ScanIndex, StoreConfig,
};
use serde_json::json;
use std::collections::HashSet;

fn record(id: &str, status: RecordStatus, updated_at: i64, tags: &[&str]) -> CatalogRecord {
    let mut r = CatalogRecord::new(id, format!("Title {id}"), status, updated_at).with_tags(tags.iter().copied());
    r.created_at = 0;
    r
}

fn seeded() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.records()
        .bulk_put(&[
            record("ABC-001", RecordStatus::Viewed, 1_000, &["Drama", "Noir"]),
            record("ABC-002", RecordStatus::Viewed, 2_000, &["comedy"]),
            record("ABC-003", RecordStatus::Want, 3_000, &["drama"]),
            record("XYZ-004", RecordStatus::Viewed, 4_000, &["drama", "romance"]),
            record("XYZ-005", RecordStatus::Browsed, 5_000, &[]),
        ])
        .unwrap();
    db
}

fn ids(records: &[CatalogRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

// ── Planning ─────────────────────────────────────────────────────

#[test]
fn status_with_timestamp_order_uses_compound_index() {
    let db = Database::open_in_memory().unwrap();
    let plan = db
        .records()
        .plan(&QuerySpec::new().status("viewed").order_by("updatedAt", Direction::Descending));

    assert_eq!(plan.index, ScanIndex::named("status_updated_at"));
    assert_eq!(plan.range, KeyRange::only("viewed".to_string()));
    assert!(plan.status_in_index);
    assert!(!plan.sort_in_memory);
}

#[test]
fn order_without_status_uses_single_field_index() {
    let db = Database::open_in_memory().unwrap();
    let plan = db
        .records()
        .plan(&QuerySpec::new().order_by("createdAt", Direction::Ascending));
    assert_eq!(plan.index, ScanIndex::named("created_at"));
    assert_eq!(plan.direction, Direction::Ascending);
}

#[test]
fn nullable_or_unindexed_order_sorts_in_memory() {
    let db = Database::open_in_memory().unwrap();
    for field in ["title", "releaseDate"] {
        let plan = db.records().plan(&QuerySpec::new().order_by(field, Direction::Ascending));
        assert_eq!(plan.index, ScanIndex::Primary);
        assert!(plan.sort_in_memory, "{field} should sort in memory");
    }
}

#[test]
fn key_order_uses_primary_scan() {
    let db = Database::open_in_memory().unwrap();
    let plan = db.records().plan(&QuerySpec::new().order_by("id", Direction::Ascending));
    assert_eq!(plan.index, ScanIndex::Primary);
    assert!(!plan.sort_in_memory);
}

#[test]
fn unknown_order_falls_back_to_default_descending() {
    let db = Database::open_in_memory().unwrap();
    let plan = db
        .records()
        .plan(&QuerySpec::new().order_by("popularity", Direction::Ascending));
    assert_eq!(plan.order_by, "updatedAt");
    assert_eq!(plan.direction, Direction::Descending);
    assert_eq!(plan.index, ScanIndex::named("updated_at"));
}

#[test]
fn actor_status_filter_targets_category() {
    let db = Database::open_in_memory().unwrap();
    let mut a = ActorRecord::new("a1", "Ann", 10);
    a.category = ActorCategory::Western;
    let mut b = ActorRecord::new("a2", "Bea", 20);
    b.category = ActorCategory::Censored;
    db.actors().bulk_put(&[a, b]).unwrap();

    let plan = db.actors().plan(&QuerySpec::new().status("western"));
    assert_eq!(plan.index, ScanIndex::named("category_updated_at"));

    let page = db.actors().query(&QuerySpec::new().status("western")).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, "a1");
}

// ── Filtering ────────────────────────────────────────────────────

#[test]
fn status_and_time_window_returns_exact_matches() {
    let db = seeded();
    let query = QuerySpec::new()
        .status("viewed")
        .order_by("updatedAt", Direction::Descending)
        .predicate(Predicate::new("updatedAt", PredicateOperator::Gte, 1_500))
        .predicate(Predicate::new("updatedAt", PredicateOperator::Lt, 5_000));

    let page = db.records().query(&query).unwrap();
    assert_eq!(ids(&page.items), vec!["XYZ-004", "ABC-002"]);
    assert_eq!(page.total, 2);
}

#[test]
fn search_is_case_insensitive_over_id_title_and_tags() {
    let db = seeded();
    let by_id = db.records().query(&QuerySpec::new().search("xyz")).unwrap();
    assert_eq!(by_id.total, 2);

    let by_tag = db.records().query(&QuerySpec::new().search("NOIR")).unwrap();
    assert_eq!(ids(&by_tag.items), vec!["ABC-001"]);

    let by_title = db.records().query(&QuerySpec::new().search("title abc-003")).unwrap();
    assert_eq!(ids(&by_title.items), vec!["ABC-003"]);
}

#[test]
fn tag_filters_are_anded() {
    let db = seeded();
    let page = db
        .records()
        .query(&QuerySpec::new().tag("drama").tag("rom").order_by("id", Direction::Ascending))
        .unwrap();
    assert_eq!(ids(&page.items), vec!["XYZ-004"]);

    let empty_tags = QuerySpec {
        tags: vec![],
        ..QuerySpec::new()
    };
    assert_eq!(db.records().query(&empty_tags).unwrap().total, 5);
}

#[test]
fn numeric_predicates_fail_closed() {
    let db = seeded();
    let page = db
        .records()
        .query(&QuerySpec::new().predicate(Predicate::new("updatedAt", PredicateOperator::Gt, "soon")))
        .unwrap();
    assert_eq!(page.total, 0);

    let page = db
        .records()
        .query(&QuerySpec::new().predicate(Predicate::new("title", PredicateOperator::Gt, 1)))
        .unwrap();
    assert_eq!(page.total, 0);
}

#[test]
fn missing_fields_count_as_empty() {
    let db = seeded();
    let page = db
        .records()
        .query(&QuerySpec::new().predicate(Predicate::new("releaseDate", PredicateOperator::Empty, json!(null))))
        .unwrap();
    assert_eq!(page.total, 5);

    let page = db
        .records()
        .query(&QuerySpec::new().predicate(Predicate::new("tags", PredicateOperator::Empty, json!(null))))
        .unwrap();
    assert_eq!(ids(&page.items), vec!["XYZ-005"]);
}

#[test]
fn in_memory_sort_breaks_ties_on_key() {
    let db = Database::open_in_memory().unwrap();
    for id in ["c", "a", "b"] {
        let mut r = record(id, RecordStatus::Browsed, 1, &[]);
        r.title = "Same".into();
        db.records().put(&r).unwrap();
    }
    let page = db
        .records()
        .query(&QuerySpec::new().order_by("title", Direction::Ascending))
        .unwrap();
    assert_eq!(ids(&page.items), vec!["a", "b", "c"]);
}

#[test]
fn total_counts_beyond_the_page() {
    let db = seeded();
    let page = db
        .records()
        .query(&QuerySpec::new().order_by("updatedAt", Direction::Ascending).page(1, 2))
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(ids(&page.items), vec!["ABC-002", "ABC-003"]);
}

#[test]
fn log_queries_filter_on_level() {
    let db = Database::open_in_memory().unwrap();
    for (ts, level) in [(1, LogLevel::Info), (2, LogLevel::Error), (3, LogLevel::Error)] {
        db.logs().put(&LogEntry::new(level, format!("event {ts}"), ts)).unwrap();
    }
    let page = db
        .logs()
        .query(&QuerySpec::new().status("ERROR").search("EVENT"))
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].timestamp_ms, 3);
}

#[test]
fn query_spec_reads_camel_case_json() {
    let query: QuerySpec = serde_json::from_value(json!({
        "search": "abc",
        "orderBy": "createdAt",
        "order": "asc",
        "offset": 10,
        "limit": 5,
        "predicates": [{"field": "tags", "operator": "not_empty"}],
    }))
    .unwrap();
    assert_eq!(query.order_by.as_deref(), Some("createdAt"));
    assert_eq!(query.order, Some(Direction::Ascending));
    assert_eq!(query.offset, 10);
    assert_eq!(query.predicates[0].operator, PredicateOperator::NotEmpty);
}

// ── Corrupt rows ─────────────────────────────────────────────────

/// A file-backed copy of `seeded()` with `ABC-002`'s document mangled.
fn seeded_with_corrupt_row(dir: &tempfile::TempDir) -> Database {
    let path = dir.path().join("catalog.db");
    let db = Database::open(&path, StoreConfig::default()).unwrap();
    db.records()
        .bulk_put(&[
            record("ABC-001", RecordStatus::Viewed, 1_000, &["Drama", "Noir"]),
            record("ABC-002", RecordStatus::Viewed, 2_000, &["comedy"]),
            record("XYZ-004", RecordStatus::Viewed, 4_000, &["drama", "romance"]),
        ])
        .unwrap();
    db.close().unwrap();

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute("UPDATE records SET data_json = '{not json' WHERE key = 'ABC-002'", [])
        .unwrap();
    drop(conn);

    Database::open(&path, StoreConfig::default()).unwrap()
}

#[test]
fn index_counted_total_includes_rows_the_scan_skips() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_with_corrupt_row(&dir);

    let page = db
        .records()
        .query(&QuerySpec::new().status("viewed").order_by("updatedAt", Direction::Descending))
        .unwrap();
    assert_eq!(ids(&page.items), vec!["XYZ-004", "ABC-001"]);
    assert_eq!(page.total, 3);
}

#[test]
fn filtered_total_counts_only_decoded_matches() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_with_corrupt_row(&dir);

    let page = db
        .records()
        .query(
            &QuerySpec::new()
                .status("viewed")
                .order_by("updatedAt", Direction::Descending)
                .predicate(Predicate::new("updatedAt", PredicateOperator::Gte, 0)),
        )
        .unwrap();
    assert_eq!(ids(&page.items), vec!["XYZ-004", "ABC-001"]);
    assert_eq!(page.total, 2);
}

// ── Pagination completeness ──────────────────────────────────────

const STATUSES: [RecordStatus; 3] = [RecordStatus::Browsed, RecordStatus::Want, RecordStatus::Viewed];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn pages_cover_every_match_exactly_once(
        rows in prop::collection::vec((0usize..3, 0i64..6), 0..40),
        page_size in 1usize..7,
        batch in 1usize..5,
        filter_status in prop::option::of(0usize..3),
        ascending in any::<bool>(),
    ) {
        let db = Database::open_in_memory_with(StoreConfig {
            scan_batch_size: batch,
            ..StoreConfig::default()
        })
        .unwrap();
        let records: Vec<CatalogRecord> = rows
            .iter()
            .enumerate()
            .map(|(i, (s, ts))| record(&format!("k{i:03}"), STATUSES[*s], *ts, &[]))
            .collect();
        db.records().bulk_put(&records).unwrap();

        let direction = if ascending { Direction::Ascending } else { Direction::Descending };
        let mut base = QuerySpec::new().order_by("updatedAt", direction);
        if let Some(s) = filter_status {
            base = base.status(STATUSES[s].as_str());
        }

        let expected: HashSet<String> = records
            .iter()
            .filter(|r| filter_status.is_none_or(|s| r.status == STATUSES[s]))
            .map(|r| r.id.clone())
            .collect();

        let mut seen = Vec::new();
        let mut offset = 0;
        loop {
            let page = db.records().query(&base.clone().page(offset, page_size)).unwrap();
            prop_assert_eq!(page.total, expected.len());
            if page.items.is_empty() {
                break;
            }
            seen.extend(page.items.into_iter().map(|r| (r.updated_at, r.id)));
            offset += page_size;
        }

        let unique: HashSet<String> = seen.iter().map(|(_, id)| id.clone()).collect();
        prop_assert_eq!(unique.len(), seen.len());
        prop_assert_eq!(unique, expected);

        let mut sorted = seen.clone();
        sorted.sort();
        if !ascending {
            sorted.reverse();
        }
        prop_assert_eq!(seen, sorted);
    }
}
