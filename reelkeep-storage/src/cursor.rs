//! Lazy, batched range scans with keyset continuation.
//!
//! A scan never holds the connection between batches. Each batch resumes
//! strictly after the last `(ordering columns.., key)` tuple it returned, so
//! rows written or deleted between batches cannot cause a row to be
//! returned twice.

use crate::database::Database;
use crate::error::{StorageError, StorageResult};
use crate::range::{Direction, KeyRange, ScanIndex};
use crate::schema::TableSpec;
use crate::store::{decode_document, decode_entity, key_from_sql};
use reelkeep_model::{EntityKey, StoredEntity};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params_from_iter};
use serde_json::Value;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::ops::Bound;
use tracing::error;

/// SQL for one index walk, resolved against a table's declared indexes.
#[derive(Debug, Clone)]
pub(crate) struct ScanQuery {
    table: &'static str,
    conditions: Vec<String>,
    params: Vec<SqlValue>,
    order_cols: Vec<&'static str>,
    direction: Direction,
}

pub(crate) struct FetchedRow {
    pub key: SqlValue,
    pub data: Option<String>,
    pub position: Vec<SqlValue>,
}

impl ScanQuery {
    pub(crate) fn new(
        spec: &'static TableSpec,
        index: &ScanIndex,
        range: &KeyRange,
        direction: Direction,
    ) -> StorageResult<Self> {
        let (columns, named): (Vec<&'static str>, bool) = match index {
            ScanIndex::Primary => (vec!["key"], false),
            ScanIndex::Named(name) => {
                let index = spec.index(name).ok_or_else(|| StorageError::UnknownIndex {
                    kind: spec.kind,
                    index: name.clone(),
                })?;
                (index.columns.to_vec(), true)
            }
        };

        let fixed = range.prefix.len();
        if fixed > columns.len() || (fixed == columns.len() && range.is_bounded()) {
            return Err(StorageError::InvalidRange(format!(
                "{} prefix values and bounds exceed the {} indexed column(s)",
                fixed,
                columns.len()
            )));
        }

        let mut conditions = Vec::new();
        let mut params = Vec::new();
        if named {
            // Rows with a null indexed column are not part of the index.
            conditions.extend(columns.iter().map(|c| format!("{c} IS NOT NULL")));
        }
        for (column, value) in columns.iter().zip(&range.prefix) {
            conditions.push(format!("{column} = ?"));
            params.push(value.clone());
        }
        if let Some(column) = columns.get(fixed) {
            push_bound(&mut conditions, &mut params, column, &range.lower, ">");
            push_bound(&mut conditions, &mut params, column, &range.upper, "<");
        }

        let mut order_cols = columns[fixed..].to_vec();
        if named || order_cols.is_empty() {
            order_cols.push("key");
        }

        Ok(Self {
            table: spec.table,
            conditions,
            params,
            order_cols,
            direction,
        })
    }

    fn where_clause(&self, after: bool) -> String {
        let mut conditions = self.conditions.clone();
        if after {
            let op = match self.direction {
                Direction::Ascending => ">",
                Direction::Descending => "<",
            };
            let placeholders = vec!["?"; self.order_cols.len()].join(", ");
            conditions.push(format!("({}) {op} ({placeholders})", self.order_cols.join(", ")));
        }
        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }

    pub(crate) fn count(&self, conn: &Connection) -> StorageResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}{}", self.table, self.where_clause(false));
        let count: i64 = conn.query_row(&sql, params_from_iter(self.params.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Fetch up to `limit` rows strictly after `after` in scan order.
    pub(crate) fn fetch(
        &self,
        conn: &Connection,
        after: Option<&[SqlValue]>,
        limit: usize,
        with_data: bool,
    ) -> StorageResult<Vec<FetchedRow>> {
        let dir = self.direction.sql();
        let order = self
            .order_cols
            .iter()
            .map(|c| format!("{c} {dir}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT key, {}, {} FROM {}{} ORDER BY {order} LIMIT ?",
            if with_data { "data_json" } else { "NULL" },
            self.order_cols.join(", "),
            self.table,
            self.where_clause(after.is_some()),
        );

        let mut params: Vec<SqlValue> = self.params.clone();
        if let Some(after) = after {
            params.extend(after.iter().cloned());
        }
        params.push(SqlValue::Integer(limit as i64));

        let width = self.order_cols.len();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let mut position = Vec::with_capacity(width);
                for i in 0..width {
                    position.push(row.get::<_, SqlValue>(i + 2)?);
                }
                Ok(FetchedRow {
                    key: row.get(0)?,
                    data: row.get(1)?,
                    position,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn push_bound(
    conditions: &mut Vec<String>,
    params: &mut Vec<SqlValue>,
    column: &str,
    bound: &Bound<SqlValue>,
    op: &str,
) {
    match bound {
        Bound::Included(v) => {
            conditions.push(format!("{column} {op}= ?"));
            params.push(v.clone());
        }
        Bound::Excluded(v) => {
            conditions.push(format!("{column} {op} ?"));
            params.push(v.clone());
        }
        Bound::Unbounded => {}
    }
}

/// A decoded row as it comes off an index: key plus JSON document.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub key: EntityKey,
    pub document: Value,
}

/// Untyped scan. Yields documents without materializing an entity, which is
/// what the query executor filters on.
pub struct RawScan {
    db: Database,
    spec: &'static TableSpec,
    query: ScanQuery,
    batch_size: usize,
    limit: Option<usize>,
    yielded: usize,
    after: Option<Vec<SqlValue>>,
    buffer: VecDeque<RawRow>,
    exhausted: bool,
}

impl RawScan {
    pub(crate) fn new(
        db: Database,
        spec: &'static TableSpec,
        query: ScanQuery,
        limit: Option<usize>,
    ) -> Self {
        let batch_size = db.config().scan_batch_size.max(1);
        Self {
            db,
            spec,
            query,
            batch_size,
            limit,
            yielded: 0,
            after: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Rewind to the start of the range.
    pub fn restart(&mut self) {
        self.yielded = 0;
        self.after = None;
        self.buffer.clear();
        self.exhausted = false;
    }

    fn fill(&mut self) -> StorageResult<()> {
        while self.buffer.is_empty() && !self.exhausted {
            let want = match self.limit {
                Some(limit) => self.batch_size.min(limit.saturating_sub(self.yielded)).max(1),
                None => self.batch_size,
            };
            let rows = self
                .db
                .with_conn(|conn| self.query.fetch(conn, self.after.as_deref(), want, true))?;

            if rows.len() < want {
                self.exhausted = true;
            }
            if let Some(last) = rows.last() {
                self.after = Some(last.position.clone());
            }

            for row in rows {
                let key = key_from_sql(row.key)?;
                let json = row.data.unwrap_or_default();
                match decode_document(self.spec, &key, &json) {
                    Ok(document) => self.buffer.push_back(RawRow { key, document }),
                    Err(e) => {
                        error!(kind = %self.spec.kind, key = %key, "skipping corrupt row: {e}");
                    }
                }
            }
        }
        Ok(())
    }
}

impl Iterator for RawScan {
    type Item = StorageResult<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.limit.is_some_and(|limit| self.yielded >= limit) {
            return None;
        }
        if let Err(e) = self.fill() {
            self.exhausted = true;
            self.buffer.clear();
            return Some(Err(e));
        }
        let row = self.buffer.pop_front()?;
        self.yielded += 1;
        Some(Ok(row))
    }
}

/// Typed range scan returned by [`EntityStore::range_scan`](crate::EntityStore::range_scan).
///
/// Finite and ordered; dropping it early is fine.
pub struct RangeScan<T> {
    raw: RawScan,
    _entity: PhantomData<fn() -> T>,
}

impl<T: StoredEntity> RangeScan<T> {
    pub(crate) fn new(raw: RawScan) -> Self {
        Self {
            raw,
            _entity: PhantomData,
        }
    }

    pub fn restart(&mut self) {
        self.raw.restart();
    }
}

impl<T: StoredEntity> Iterator for RangeScan<T> {
    type Item = StorageResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.raw.next()?;
        Some(row.and_then(|row| decode_entity(row.document)))
    }
}
