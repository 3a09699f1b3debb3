//! The explicitly constructed database handle.

use crate::config::StoreConfig;
use crate::error::{StorageError, StorageResult};
use crate::migrations::{self, AppliedMigration};
use crate::store::EntityStore;
use reelkeep_model::{
    ActorRecord, CatalogRecord, DailyAggregate, LinkCacheEntry, LogEntry, MonthlyReport, NewWork,
    StoredEntity,
};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};

/// Thread-safe handle to the catalog database.
///
/// Cloning is cheap and every clone shares one connection. Closing any clone
/// closes them all; afterwards every operation fails with
/// [`StorageError::Closed`].
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Option<Connection>>>,
    config: Arc<StoreConfig>,
    migrations: Arc<Vec<AppliedMigration>>,
}

impl Database {
    /// Open (or create) the database at `path` and run pending migrations.
    pub fn open(path: &Path, config: StoreConfig) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        info!(path = %path.display(), "opening catalog database");
        Self::from_connection(conn, config)
    }

    /// Open an in-memory database with default configuration (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::open_in_memory_with(StoreConfig::default())
    }

    pub fn open_in_memory_with(config: StoreConfig) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, config)
    }

    /// Wrap an existing connection, migrating it to the current schema.
    pub fn from_connection(mut conn: Connection, config: StoreConfig) -> StorageResult<Self> {
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        let applied = migrations::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            config: Arc::new(config),
            migrations: Arc::new(applied),
        })
    }

    fn lock_conn(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("recovering from poisoned connection mutex");
            poisoned.into_inner()
        })
    }

    /// Run `f` against the open connection.
    pub(crate) fn with_conn<R>(
        &self,
        f: impl FnOnce(&mut Connection) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let mut guard = self.lock_conn();
        let conn = guard.as_mut().ok_or(StorageError::Closed)?;
        f(conn)
    }

    /// Close the connection. Closing twice is a no-op.
    pub fn close(&self) -> StorageResult<()> {
        let taken = self.lock_conn().take();
        if let Some(conn) = taken {
            conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
            info!("catalog database closed");
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.lock_conn().is_some()
    }

    pub fn schema_version(&self) -> StorageResult<u32> {
        self.with_conn(|conn| migrations::current_version(conn))
    }

    /// Migration steps applied when this handle was opened.
    pub fn migration_log(&self) -> &[AppliedMigration] {
        &self.migrations
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Typed store for one entity kind.
    pub fn table<T: StoredEntity>(&self) -> EntityStore<T> {
        EntityStore::new(self.clone())
    }

    pub fn records(&self) -> EntityStore<CatalogRecord> {
        self.table()
    }

    pub fn actors(&self) -> EntityStore<ActorRecord> {
        self.table()
    }

    pub fn logs(&self) -> EntityStore<LogEntry> {
        self.table()
    }

    pub fn new_works(&self) -> EntityStore<NewWork> {
        self.table()
    }

    pub fn link_cache(&self) -> EntityStore<LinkCacheEntry> {
        self.table()
    }

    pub fn daily_stats(&self) -> EntityStore<DailyAggregate> {
        self.table()
    }

    pub fn monthly_reports(&self) -> EntityStore<MonthlyReport> {
        self.table()
    }
}
