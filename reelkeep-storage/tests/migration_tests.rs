use pretty_assertions::assert_eq;
use reelkeep_model::{LinkCacheEntry, NewWork, RecordStatus};
use reelkeep_storage::migrations::{self, MIGRATIONS};
use reelkeep_storage::{Database, SCHEMA_VERSION, StorageError, StoreConfig};
use rusqlite::{Connection, params};

fn index_names(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1 AND name LIKE 'idx_%' ORDER BY name")
        .unwrap();
    stmt.query_map(params![table], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}

#[test]
fn migrations_form_a_contiguous_chain() {
    for (i, step) in MIGRATIONS.iter().enumerate() {
        assert_eq!(step.from_version, i as u32);
    }
    assert_eq!(MIGRATIONS.len() as u32, SCHEMA_VERSION);
}

#[test]
fn fresh_database_runs_every_step() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);

    let log: Vec<(u32, u32)> = db
        .migration_log()
        .iter()
        .map(|m| (m.from_version, m.to_version))
        .collect();
    assert_eq!(log, vec![(0, 1), (1, 2), (2, 3), (3, 4)]);
}

#[test]
fn every_declared_index_exists() {
    let mut conn = Connection::open_in_memory().unwrap();
    migrations::migrate(&mut conn).unwrap();

    for kind in reelkeep_model::EntityKind::ALL {
        let spec = reelkeep_storage::schema::TableSpec::for_kind(kind);
        let existing = index_names(&conn, spec.table);
        for index in spec.indexes {
            let name = spec.sql_index_name(index);
            assert!(existing.contains(&name), "missing index {name}");
        }
    }
}

#[test]
fn partial_schema_upgrades_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v2.db");

    {
        let mut conn = Connection::open(&path).unwrap();
        let applied = migrations::migrate_to(&mut conn, 2).unwrap();
        assert_eq!(applied.len(), 2);
        assert_eq!(migrations::current_version(&conn).unwrap(), 2);
        assert!(index_names(&conn, "link_cache").iter().all(|n| n != "idx_link_cache_expire_at"));

        conn.execute(
            "INSERT INTO records (key, data_json, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                "ABC-123",
                r#"{"id":"ABC-123","title":"Old row","status":"want","tags":[],"createdAt":1,"updatedAt":2}"#,
                "want",
                1,
                2
            ],
        )
        .unwrap();
    }

    let db = Database::open(&path, StoreConfig::default()).unwrap();
    let log: Vec<u32> = db.migration_log().iter().map(|m| m.to_version).collect();
    assert_eq!(log, vec![3, 4]);
    assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);

    let record = db.records().get("ABC-123").unwrap().unwrap();
    assert_eq!(record.status, RecordStatus::Want);

    // Tables added by later steps are usable.
    db.new_works().put(&NewWork::new("ABC-123", "actor-1", "Old row", 5)).unwrap();
    db.link_cache()
        .put(&LinkCacheEntry::new("ABC-123", "mirror", "h", 5).with_ttl(10))
        .unwrap();
}

#[test]
fn newer_schema_is_refused() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "user_version", 99).unwrap();

    match Database::from_connection(conn, StoreConfig::default()) {
        Err(StorageError::Migration { version, .. }) => assert_eq!(version, 99),
        Err(other) => panic!("expected migration error, got {other:?}"),
        Ok(_) => panic!("newer schema was accepted"),
    }

    let mut conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "user_version", 99).unwrap();
    assert!(migrations::migrate(&mut conn).is_err());
}
