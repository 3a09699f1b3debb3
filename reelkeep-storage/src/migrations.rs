//! Ordered schema migrations keyed on `PRAGMA user_version`.
//!
//! Each step upgrades exactly one version and runs in its own transaction,
//! so a failed step leaves the database at the previous version.

use crate::error::{StorageError, StorageResult};
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use tracing::{debug, info};

/// One schema upgrade from `from_version` to `from_version + 1`.
pub struct Migration {
    pub from_version: u32,
    pub description: &'static str,
    pub apply: fn(&Transaction<'_>) -> rusqlite::Result<()>,
}

/// A migration step that ran while opening the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub from_version: u32,
    pub to_version: u32,
    pub description: &'static str,
}

pub static MIGRATIONS: &[Migration] = &[
    Migration {
        from_version: 0,
        description: "records, actors and logs tables",
        apply: create_core_tables,
    },
    Migration {
        from_version: 1,
        description: "new works and link cache tables",
        apply: create_discovery_tables,
    },
    Migration {
        from_version: 2,
        description: "compound status indexes and analytics tables",
        apply: create_compound_indexes_and_analytics,
    },
    Migration {
        from_version: 3,
        description: "link cache expiry index and per-actor discovery index",
        apply: create_expiry_indexes,
    },
];

/// Version reached after every migration has run.
pub const SCHEMA_VERSION: u32 = 4;

pub fn current_version(conn: &Connection) -> StorageResult<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version as u32)
}

/// Upgrade to the latest schema version.
pub fn migrate(conn: &mut Connection) -> StorageResult<Vec<AppliedMigration>> {
    migrate_to(conn, SCHEMA_VERSION)
}

/// Upgrade to `target`, running each pending step in order.
pub fn migrate_to(conn: &mut Connection, target: u32) -> StorageResult<Vec<AppliedMigration>> {
    let mut version = current_version(conn)?;
    if version > SCHEMA_VERSION {
        return Err(StorageError::Migration {
            version,
            reason: format!("database is newer than supported schema {SCHEMA_VERSION}"),
        });
    }

    let start = version;
    let mut applied = Vec::new();
    for step in MIGRATIONS.iter().filter(move |m| m.from_version >= start && m.from_version < target) {
        let to_version = step.from_version + 1;
        debug!(from = step.from_version, to = to_version, "applying migration: {}", step.description);

        let tx = conn.transaction()?;
        (step.apply)(&tx).map_err(|e| StorageError::Migration {
            version: to_version,
            reason: e.to_string(),
        })?;
        tx.pragma_update(None, "user_version", i64::from(to_version))?;
        tx.commit()?;

        version = to_version;
        applied.push(AppliedMigration {
            from_version: step.from_version,
            to_version,
            description: step.description,
        });
    }

    if !applied.is_empty() {
        info!(version, steps = applied.len(), "schema migrated");
    }
    Ok(applied)
}

fn create_core_tables(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            key TEXT PRIMARY KEY NOT NULL,
            data_json TEXT NOT NULL,
            status TEXT,
            created_at INTEGER,
            updated_at INTEGER,
            release_date TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_records_status ON records(status);
        CREATE INDEX IF NOT EXISTS idx_records_created_at ON records(created_at);
        CREATE INDEX IF NOT EXISTS idx_records_updated_at ON records(updated_at);
        CREATE INDEX IF NOT EXISTS idx_records_release_date ON records(release_date);

        CREATE TABLE IF NOT EXISTS actors (
            key TEXT PRIMARY KEY NOT NULL,
            data_json TEXT NOT NULL,
            name TEXT,
            gender TEXT,
            category TEXT,
            blacklisted INTEGER,
            created_at INTEGER,
            updated_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_actors_name ON actors(name);
        CREATE INDEX IF NOT EXISTS idx_actors_gender ON actors(gender);
        CREATE INDEX IF NOT EXISTS idx_actors_category ON actors(category);
        CREATE INDEX IF NOT EXISTS idx_actors_blacklisted ON actors(blacklisted);
        CREATE INDEX IF NOT EXISTS idx_actors_created_at ON actors(created_at);
        CREATE INDEX IF NOT EXISTS idx_actors_updated_at ON actors(updated_at);

        -- Log entries are append-only; AUTOINCREMENT keeps ids from being
        -- reused after retention deletes the newest rows.
        CREATE TABLE IF NOT EXISTS logs (
            key INTEGER PRIMARY KEY AUTOINCREMENT,
            data_json TEXT NOT NULL,
            level TEXT,
            timestamp_ms INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_logs_level ON logs(level);
        CREATE INDEX IF NOT EXISTS idx_logs_timestamp_ms ON logs(timestamp_ms);
        "#,
    )
}

fn create_discovery_tables(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS new_works (
            key TEXT PRIMARY KEY NOT NULL,
            data_json TEXT NOT NULL,
            actor_id TEXT,
            discovered_at INTEGER,
            is_read INTEGER,
            status TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_new_works_actor_id ON new_works(actor_id);
        CREATE INDEX IF NOT EXISTS idx_new_works_discovered_at ON new_works(discovered_at);
        CREATE INDEX IF NOT EXISTS idx_new_works_is_read ON new_works(is_read);
        CREATE INDEX IF NOT EXISTS idx_new_works_status ON new_works(status);

        CREATE TABLE IF NOT EXISTS link_cache (
            key TEXT PRIMARY KEY NOT NULL,
            data_json TEXT NOT NULL,
            subject_id TEXT,
            source TEXT,
            created_at INTEGER,
            expire_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_link_cache_subject_id ON link_cache(subject_id);
        CREATE INDEX IF NOT EXISTS idx_link_cache_source ON link_cache(source);
        CREATE INDEX IF NOT EXISTS idx_link_cache_created_at ON link_cache(created_at);
        "#,
    )
}

fn create_compound_indexes_and_analytics(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        r#"
        CREATE INDEX IF NOT EXISTS idx_records_status_updated_at ON records(status, updated_at);
        CREATE INDEX IF NOT EXISTS idx_records_status_created_at ON records(status, created_at);
        CREATE INDEX IF NOT EXISTS idx_actors_category_updated_at ON actors(category, updated_at);
        CREATE INDEX IF NOT EXISTS idx_logs_level_timestamp_ms ON logs(level, timestamp_ms);
        CREATE INDEX IF NOT EXISTS idx_new_works_status_discovered_at ON new_works(status, discovered_at);

        CREATE TABLE IF NOT EXISTS daily_stats (
            key TEXT PRIMARY KEY NOT NULL,
            data_json TEXT NOT NULL,
            updated_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_daily_stats_updated_at ON daily_stats(updated_at);

        CREATE TABLE IF NOT EXISTS monthly_reports (
            key TEXT PRIMARY KEY NOT NULL,
            data_json TEXT NOT NULL,
            status TEXT,
            created_at INTEGER,
            updated_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_monthly_reports_status ON monthly_reports(status);
        CREATE INDEX IF NOT EXISTS idx_monthly_reports_updated_at ON monthly_reports(updated_at);
        CREATE INDEX IF NOT EXISTS idx_monthly_reports_status_updated_at ON monthly_reports(status, updated_at);
        "#,
    )
}

fn create_expiry_indexes(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        r#"
        CREATE INDEX IF NOT EXISTS idx_link_cache_expire_at ON link_cache(expire_at);
        CREATE INDEX IF NOT EXISTS idx_new_works_actor_id_discovered_at ON new_works(actor_id, discovered_at);
        "#,
    )
}
