//! Typed per-kind entity store.

use crate::cursor::{RangeScan, RawScan, ScanQuery};
use crate::database::Database;
use crate::error::{StorageError, StorageResult};
use crate::range::{Direction, KeyRange, ScanIndex};
use crate::schema::{KeyType, TableSpec, column_value};
use reelkeep_model::{EntityKey, EntityKind, LinkCacheEntry, StoredEntity};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Value;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use tracing::debug;

/// Store for one entity kind, obtained from [`Database::table`].
pub struct EntityStore<T> {
    db: Database,
    spec: &'static TableSpec,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityStore<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            spec: self.spec,
            _entity: PhantomData,
        }
    }
}

impl<T: StoredEntity> EntityStore<T> {
    pub(crate) fn new(db: Database) -> Self {
        Self {
            db,
            spec: TableSpec::for_kind(T::KIND),
            _entity: PhantomData,
        }
    }

    pub fn kind(&self) -> EntityKind {
        T::KIND
    }

    pub fn spec(&self) -> &'static TableSpec {
        self.spec
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Upsert by primary key and return the value as stored.
    ///
    /// An existing row keeps its `createdAt`, and its `updatedAt` never moves
    /// backwards. Log entries without an id get one assigned.
    pub fn put(&self, entity: &T) -> StorageResult<T> {
        let stored = self.db.with_conn(|conn| put_in(conn, self.spec, entity))?;
        debug!(kind = %T::KIND, key = ?stored.key(), "put");
        Ok(stored)
    }

    /// Upsert a batch in one transaction.
    ///
    /// Duplicate keys collapse, last write wins. On any failure the whole
    /// batch is rolled back and the cause is returned inside
    /// [`StorageError::Transaction`].
    pub fn bulk_put(&self, entities: &[T]) -> StorageResult<Vec<T>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let stored = self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut stored = Vec::with_capacity(entities.len());
            for entity in entities {
                match put_in(&tx, self.spec, entity) {
                    Ok(value) => stored.push(value),
                    Err(source) => {
                        // Dropping the transaction rolls it back.
                        drop(tx);
                        return Err(StorageError::Transaction {
                            kind: T::KIND,
                            source: Box::new(source),
                        });
                    }
                }
            }
            tx.commit()?;
            Ok(stored)
        })?;
        debug!(kind = %T::KIND, count = stored.len(), "bulk put");
        Ok(stored)
    }

    pub fn get(&self, key: impl Into<EntityKey>) -> StorageResult<Option<T>> {
        let key = key.into();
        let document = self.db.with_conn(|conn| read_document(conn, self.spec, &key))?;
        document.map(decode_entity).transpose()
    }

    /// Returns whether a row was removed.
    pub fn delete(&self, key: impl Into<EntityKey>) -> StorageResult<bool> {
        let key = key.into();
        let removed = self.db.with_conn(|conn| {
            let sql = format!("DELETE FROM {} WHERE key = ?1", self.spec.table);
            Ok(conn.execute(&sql, params![key_to_sql(&key)])?)
        })?;
        debug!(kind = %T::KIND, key = %key, removed, "delete");
        Ok(removed > 0)
    }

    /// Delete many keys in one transaction and return how many existed.
    pub fn bulk_delete<K>(&self, keys: &[K]) -> StorageResult<usize>
    where
        K: Clone + Into<EntityKey>,
    {
        if keys.is_empty() {
            return Ok(0);
        }
        let removed = self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            {
                let sql = format!("DELETE FROM {} WHERE key = ?1", self.spec.table);
                let mut stmt = tx.prepare(&sql)?;
                for key in keys {
                    removed += stmt.execute(params![key_to_sql(&key.clone().into())])?;
                }
            }
            tx.commit()?;
            Ok(removed)
        })?;
        debug!(kind = %T::KIND, requested = keys.len(), removed, "bulk delete");
        Ok(removed)
    }

    /// Number of rows in an index range.
    pub fn count(&self, index: &ScanIndex, range: &KeyRange) -> StorageResult<usize> {
        let query = ScanQuery::new(self.spec, index, range, Direction::Ascending)?;
        self.db.with_conn(|conn| query.count(conn))
    }

    pub fn count_all(&self) -> StorageResult<usize> {
        self.count(&ScanIndex::Primary, &KeyRange::all())
    }

    /// Lazily walk an index range in `direction`.
    pub fn range_scan(
        &self,
        index: &ScanIndex,
        range: &KeyRange,
        direction: Direction,
        limit: Option<usize>,
    ) -> StorageResult<RangeScan<T>> {
        Ok(RangeScan::new(self.raw_scan(index, range, direction, limit)?))
    }

    pub(crate) fn raw_scan(
        &self,
        index: &ScanIndex,
        range: &KeyRange,
        direction: Direction,
        limit: Option<usize>,
    ) -> StorageResult<RawScan> {
        let query = ScanQuery::new(self.spec, index, range, direction)?;
        Ok(RawScan::new(self.db.clone(), self.spec, query, limit))
    }

    /// Delete rows in an index range, walking it in `direction`.
    ///
    /// Each batch of keys is deleted in its own short transaction, so the
    /// connection is released between batches and the range is never
    /// loaded whole.
    pub fn delete_range(
        &self,
        index: &ScanIndex,
        range: &KeyRange,
        direction: Direction,
        limit: Option<usize>,
    ) -> StorageResult<usize> {
        let query = ScanQuery::new(self.spec, index, range, direction)?;
        let batch_size = self.db.config().scan_batch_size.max(1);
        let delete_sql = format!("DELETE FROM {} WHERE key = ?1", self.spec.table);

        let mut deleted = 0usize;
        let mut after: Option<Vec<SqlValue>> = None;
        loop {
            let want = match limit {
                Some(limit) if deleted >= limit => break,
                Some(limit) => batch_size.min(limit - deleted),
                None => batch_size,
            };
            let (removed, fetched, last) = self.db.with_conn(|conn| {
                let tx = conn.transaction()?;
                let rows = query.fetch(&tx, after.as_deref(), want, false)?;
                let mut removed = 0;
                {
                    let mut stmt = tx.prepare(&delete_sql)?;
                    for row in &rows {
                        removed += stmt.execute(params![row.key])?;
                    }
                }
                tx.commit()?;
                Ok((removed, rows.len(), rows.last().map(|r| r.position.clone())))
            })?;

            deleted += removed;
            if fetched < want {
                break;
            }
            after = last;
        }

        debug!(kind = %T::KIND, deleted, "delete range");
        Ok(deleted)
    }

    /// Every entity of this kind in primary-key order.
    pub fn export_all(&self) -> StorageResult<Vec<T>> {
        self.range_scan(&ScanIndex::Primary, &KeyRange::all(), Direction::Ascending, None)?
            .collect()
    }

    /// Every entity keyed by its primary key rendered as a string.
    pub fn export_map(&self) -> StorageResult<BTreeMap<String, T>> {
        let mut map = BTreeMap::new();
        for entity in self.export_all()? {
            if let Some(key) = entity.key() {
                map.insert(key.to_string(), entity);
            }
        }
        Ok(map)
    }
}

impl EntityStore<LinkCacheEntry> {
    /// Look up a cache entry, hiding it once `expireAt <= now` even if the
    /// sweeper has not removed it yet.
    pub fn get_live(&self, key: impl Into<EntityKey>, now: i64) -> StorageResult<Option<LinkCacheEntry>> {
        Ok(self.get(key)?.filter(|entry| !entry.is_expired(now)))
    }
}

fn put_in<T: StoredEntity>(conn: &Connection, spec: &'static TableSpec, entity: &T) -> StorageResult<T> {
    let mut stored = entity.clone();
    let key = entity.key();

    match (&key, spec.key_type) {
        (Some(EntityKey::Text(text)), KeyType::Text) if text.trim().is_empty() => {
            return Err(StorageError::Validation(format!("{} has an empty key", T::KIND)));
        }
        (Some(EntityKey::Text(_)), KeyType::Text) | (_, KeyType::AutoIncrement) => {}
        (other, KeyType::Text) => {
            return Err(StorageError::Validation(format!(
                "{} requires a text key, got {other:?}",
                T::KIND
            )));
        }
    }

    if let Some(key) = &key {
        if let Some(existing) = read_document(conn, spec, key)? {
            let existing: T = decode_entity(existing)?;
            if let Some(created) = existing.created_at() {
                stored.set_created_at(created);
            }
            if let (Some(previous), Some(next)) = (existing.updated_at(), stored.updated_at()) {
                if next < previous {
                    stored.set_updated_at(previous);
                }
            }
        }
    }

    let mut document = serde_json::to_value(&stored)?;
    if spec.key_type == KeyType::AutoIncrement {
        if let (Some(field), Value::Object(map)) = (spec.key_field, &mut document) {
            map.remove(field);
        }
    }
    let data_json = serde_json::to_string(&document)?;

    let mut columns = vec!["data_json"];
    let mut values = vec![SqlValue::Text(data_json)];
    for column in spec.columns {
        columns.push(column.column);
        values.push(column_value(&document, column));
    }
    if let Some(key) = &key {
        columns.insert(0, "key");
        values.insert(0, key_to_sql(key));
    }

    let placeholders = vec!["?"; columns.len()].join(", ");
    let updates = columns
        .iter()
        .filter(|c| **c != "key")
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = if key.is_some() {
        format!(
            "INSERT INTO {} ({}) VALUES ({placeholders}) ON CONFLICT(key) DO UPDATE SET {updates}",
            spec.table,
            columns.join(", "),
        )
    } else {
        format!("INSERT INTO {} ({}) VALUES ({placeholders})", spec.table, columns.join(", "))
    };
    conn.execute(&sql, params_from_iter(values.iter()))?;

    if key.is_none() {
        stored.assign_key(conn.last_insert_rowid());
    }
    Ok(stored)
}

fn read_document(conn: &Connection, spec: &'static TableSpec, key: &EntityKey) -> StorageResult<Option<Value>> {
    let sql = format!("SELECT data_json FROM {} WHERE key = ?1", spec.table);
    let json: Option<String> = conn
        .query_row(&sql, params![key_to_sql(key)], |row| row.get(0))
        .optional()?;
    json.map(|json| decode_document(spec, key, &json).map_err(StorageError::from))
        .transpose()
}

pub(crate) fn key_to_sql(key: &EntityKey) -> SqlValue {
    match key {
        EntityKey::Int(i) => SqlValue::Integer(*i),
        EntityKey::Text(s) => SqlValue::Text(s.clone()),
    }
}

pub(crate) fn key_from_sql(value: SqlValue) -> StorageResult<EntityKey> {
    match value {
        SqlValue::Integer(i) => Ok(EntityKey::Int(i)),
        SqlValue::Text(s) => Ok(EntityKey::Text(s)),
        other => Err(StorageError::Validation(format!("unsupported key value {other:?}"))),
    }
}

/// Parse a stored document. Auto-increment kinds keep their id in the key
/// column only, so it is patched back in here.
pub(crate) fn decode_document(
    spec: &TableSpec,
    key: &EntityKey,
    json: &str,
) -> serde_json::Result<Value> {
    let mut document: Value = serde_json::from_str(json)?;
    if spec.key_type == KeyType::AutoIncrement {
        if let (Some(field), Value::Object(map), EntityKey::Int(id)) =
            (spec.key_field, &mut document, key)
        {
            map.insert(field.to_string(), Value::from(*id));
        }
    }
    Ok(document)
}

pub(crate) fn decode_entity<T: StoredEntity>(document: Value) -> StorageResult<T> {
    Ok(serde_json::from_value(document)?)
}
