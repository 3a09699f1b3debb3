//! Declared table layout per entity kind.
//!
//! Each kind is one table: a primary `key` column, the entity's JSON
//! document in `data_json`, and a set of columns extracted from the
//! document so SQLite indexes can serve range scans. The DDL that creates
//! these lives in [`crate::migrations`]; this module is what the runtime
//! consults for planning.

use reelkeep_model::EntityKind;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    /// Epoch milliseconds.
    Timestamp,
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Text,
    AutoIncrement,
}

/// A column extracted from the entity document.
#[derive(Debug)]
pub struct IndexedColumn {
    pub column: &'static str,
    /// JSON field the value is read from.
    pub field: &'static str,
    pub ty: ColumnType,
    /// Nullable columns drop rows from their indexes, so the planner
    /// never orders a full result set through them.
    pub nullable: bool,
}

#[derive(Debug)]
pub struct IndexSpec {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

#[derive(Debug)]
pub struct TableSpec {
    pub kind: EntityKind,
    pub table: &'static str,
    pub key_type: KeyType,
    /// JSON field holding the primary key, when the key is a plain field.
    pub key_field: Option<&'static str>,
    pub columns: &'static [IndexedColumn],
    pub indexes: &'static [IndexSpec],
    /// Fields matched by free-text search.
    pub search_fields: &'static [&'static str],
    /// Field used for status-style equality filters.
    pub status_field: Option<&'static str>,
    /// Multi-valued field matched by tag filters.
    pub multi_field: Option<&'static str>,
    /// Field used when a query names no (or an unknown) order.
    pub default_order: &'static str,
    /// Extra fields a query may order by in memory.
    pub sortable: &'static [&'static str],
}

const fn col(column: &'static str, field: &'static str, ty: ColumnType) -> IndexedColumn {
    IndexedColumn { column, field, ty, nullable: false }
}

const fn nullable(column: &'static str, field: &'static str, ty: ColumnType) -> IndexedColumn {
    IndexedColumn { column, field, ty, nullable: true }
}

const fn idx(name: &'static str, columns: &'static [&'static str]) -> IndexSpec {
    IndexSpec { name, columns }
}

pub static RECORDS: TableSpec = TableSpec {
    kind: EntityKind::Record,
    table: "records",
    key_type: KeyType::Text,
    key_field: Some("id"),
    columns: &[
        col("status", "status", ColumnType::Text),
        col("created_at", "createdAt", ColumnType::Timestamp),
        col("updated_at", "updatedAt", ColumnType::Timestamp),
        nullable("release_date", "releaseDate", ColumnType::Text),
    ],
    indexes: &[
        idx("status", &["status"]),
        idx("created_at", &["created_at"]),
        idx("updated_at", &["updated_at"]),
        idx("release_date", &["release_date"]),
        idx("status_updated_at", &["status", "updated_at"]),
        idx("status_created_at", &["status", "created_at"]),
    ],
    search_fields: &["id", "title", "tags"],
    status_field: Some("status"),
    multi_field: Some("tags"),
    default_order: "updatedAt",
    sortable: &["title", "releaseDate"],
};

pub static ACTORS: TableSpec = TableSpec {
    kind: EntityKind::Actor,
    table: "actors",
    key_type: KeyType::Text,
    key_field: Some("id"),
    columns: &[
        col("name", "name", ColumnType::Text),
        col("gender", "gender", ColumnType::Text),
        col("category", "category", ColumnType::Text),
        nullable("blacklisted", "blacklisted", ColumnType::Boolean),
        col("created_at", "createdAt", ColumnType::Timestamp),
        col("updated_at", "updatedAt", ColumnType::Timestamp),
    ],
    indexes: &[
        idx("name", &["name"]),
        idx("gender", &["gender"]),
        idx("category", &["category"]),
        idx("blacklisted", &["blacklisted"]),
        idx("created_at", &["created_at"]),
        idx("updated_at", &["updated_at"]),
        idx("category_updated_at", &["category", "updated_at"]),
    ],
    search_fields: &["id", "name", "aliases"],
    status_field: Some("category"),
    multi_field: Some("aliases"),
    default_order: "updatedAt",
    sortable: &[],
};

pub static LOGS: TableSpec = TableSpec {
    kind: EntityKind::LogEntry,
    table: "logs",
    key_type: KeyType::AutoIncrement,
    key_field: Some("id"),
    columns: &[
        col("level", "level", ColumnType::Text),
        col("timestamp_ms", "timestampMs", ColumnType::Timestamp),
    ],
    indexes: &[
        idx("level", &["level"]),
        idx("timestamp_ms", &["timestamp_ms"]),
        idx("level_timestamp_ms", &["level", "timestamp_ms"]),
    ],
    search_fields: &["message"],
    status_field: Some("level"),
    multi_field: None,
    default_order: "timestampMs",
    sortable: &["message"],
};

pub static NEW_WORKS: TableSpec = TableSpec {
    kind: EntityKind::NewWork,
    table: "new_works",
    key_type: KeyType::Text,
    key_field: Some("id"),
    columns: &[
        col("actor_id", "actorId", ColumnType::Text),
        col("discovered_at", "discoveredAt", ColumnType::Timestamp),
        col("is_read", "isRead", ColumnType::Boolean),
        col("status", "status", ColumnType::Text),
    ],
    indexes: &[
        idx("actor_id", &["actor_id"]),
        idx("discovered_at", &["discovered_at"]),
        idx("is_read", &["is_read"]),
        idx("status", &["status"]),
        idx("status_discovered_at", &["status", "discovered_at"]),
        idx("actor_id_discovered_at", &["actor_id", "discovered_at"]),
    ],
    search_fields: &["id", "title", "actorId"],
    status_field: Some("status"),
    multi_field: None,
    default_order: "discoveredAt",
    sortable: &["title"],
};

pub static LINK_CACHE: TableSpec = TableSpec {
    kind: EntityKind::LinkCache,
    table: "link_cache",
    key_type: KeyType::Text,
    key_field: None,
    columns: &[
        col("subject_id", "subjectId", ColumnType::Text),
        col("source", "source", ColumnType::Text),
        col("created_at", "createdAt", ColumnType::Timestamp),
        nullable("expire_at", "expireAt", ColumnType::Timestamp),
    ],
    indexes: &[
        idx("subject_id", &["subject_id"]),
        idx("source", &["source"]),
        idx("created_at", &["created_at"]),
        idx("expire_at", &["expire_at"]),
    ],
    search_fields: &["subjectId", "source"],
    status_field: None,
    multi_field: Some("links"),
    default_order: "createdAt",
    sortable: &["expireAt"],
};

pub static DAILY_STATS: TableSpec = TableSpec {
    kind: EntityKind::DailyAggregate,
    table: "daily_stats",
    key_type: KeyType::Text,
    key_field: Some("date"),
    columns: &[col("updated_at", "updatedAt", ColumnType::Timestamp)],
    indexes: &[idx("updated_at", &["updated_at"])],
    search_fields: &["date"],
    status_field: None,
    multi_field: None,
    default_order: "date",
    sortable: &["total"],
};

pub static MONTHLY_REPORTS: TableSpec = TableSpec {
    kind: EntityKind::MonthlyReport,
    table: "monthly_reports",
    key_type: KeyType::Text,
    key_field: Some("month"),
    columns: &[
        col("status", "status", ColumnType::Text),
        col("created_at", "createdAt", ColumnType::Timestamp),
        col("updated_at", "updatedAt", ColumnType::Timestamp),
    ],
    indexes: &[
        idx("status", &["status"]),
        idx("updated_at", &["updated_at"]),
        idx("status_updated_at", &["status", "updated_at"]),
    ],
    search_fields: &["month"],
    status_field: Some("status"),
    multi_field: None,
    default_order: "updatedAt",
    sortable: &["createdAt"],
};

impl TableSpec {
    pub fn for_kind(kind: EntityKind) -> &'static TableSpec {
        match kind {
            EntityKind::Record => &RECORDS,
            EntityKind::Actor => &ACTORS,
            EntityKind::LogEntry => &LOGS,
            EntityKind::NewWork => &NEW_WORKS,
            EntityKind::LinkCache => &LINK_CACHE,
            EntityKind::DailyAggregate => &DAILY_STATS,
            EntityKind::MonthlyReport => &MONTHLY_REPORTS,
        }
    }

    pub fn index(&self, name: &str) -> Option<&'static IndexSpec> {
        self.indexes.iter().find(|i| i.name == name)
    }

    pub fn column(&self, column: &str) -> Option<&IndexedColumn> {
        self.columns.iter().find(|c| c.column == column)
    }

    pub fn column_for_field(&self, field: &str) -> Option<&IndexedColumn> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// The single-column index on `column`, if declared.
    pub fn single_index_on(&self, column: &str) -> Option<&'static IndexSpec> {
        self.indexes.iter().find(|i| i.columns == [column])
    }

    /// The two-column index `(lead, second)`, if declared.
    pub fn compound_index_on(&self, lead: &str, second: &str) -> Option<&'static IndexSpec> {
        self.indexes.iter().find(|i| i.columns == [lead, second])
    }

    /// SQL name of a declared index.
    pub fn sql_index_name(&self, index: &IndexSpec) -> String {
        format!("idx_{}_{}", self.table, index.name)
    }

    /// True if `field` can order a query, either through the primary key,
    /// an extracted column, or an in-memory sort.
    pub fn is_orderable(&self, field: &str) -> bool {
        self.key_field == Some(field)
            || self.column_for_field(field).is_some()
            || self.sortable.contains(&field)
    }
}

/// Extract the SQL value of an indexed column from an entity document.
pub(crate) fn column_value(data: &Value, column: &IndexedColumn) -> SqlValue {
    match (data.get(column.field), column.ty) {
        (Some(Value::String(s)), ColumnType::Text) => SqlValue::Text(s.clone()),
        (Some(Value::Number(n)), ColumnType::Timestamp) => {
            n.as_i64().map(SqlValue::Integer).unwrap_or(SqlValue::Null)
        }
        (Some(Value::Bool(b)), ColumnType::Boolean) => SqlValue::Integer(i64::from(*b)),
        _ => SqlValue::Null,
    }
}
