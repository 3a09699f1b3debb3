//! Filtered, sorted, paginated queries over one entity kind.
//!
//! A query is planned onto at most one index. Everything the index cannot
//! answer is applied as a residual filter to the decoded JSON document, so
//! only rows that match (and fall inside the page window) are materialized.

use crate::error::StorageResult;
use crate::predicate::{Predicate, as_number};
use crate::range::{Direction, KeyRange, ScanIndex};
use crate::schema::{ColumnType, TableSpec};
use crate::store::{EntityStore, decode_entity};
use reelkeep_model::{EntityKey, StoredEntity};
use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use tracing::debug;

/// Filter, order and window for a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuerySpec {
    /// Case-insensitive substring over the kind's search fields.
    pub search: Option<String>,
    /// Equality on the kind's status-like field.
    pub status: Option<String>,
    /// Every tag must appear (as a substring) in the kind's multi-valued field.
    pub tags: Vec<String>,
    pub predicates: Vec<Predicate>,
    pub order_by: Option<String>,
    pub order: Option<Direction>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: Direction) -> Self {
        self.order_by = Some(field.into());
        self.order = Some(order);
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }
}

/// One page of results. `total` counts every match, not just this page.
///
/// A query with no residual filter and no in-memory sort takes `total`
/// from an index count, so rows whose documents fail to decode are
/// counted there even though `items` skips them. Any other query counts
/// only rows that decoded and matched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPage<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// How a query will be executed.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub index: ScanIndex,
    pub range: KeyRange,
    pub direction: Direction,
    /// The order field actually used, after fallback.
    pub order_by: String,
    /// True when no index supports the order and rows are sorted in memory.
    pub sort_in_memory: bool,
    /// True when the status filter is answered by the index prefix.
    pub status_in_index: bool,
}

impl QueryPlan {
    fn build(spec: &'static TableSpec, query: &QuerySpec) -> Self {
        let (order_by, direction) = match &query.order_by {
            Some(field) if spec.is_orderable(field) => (field.clone(), query.order.unwrap_or_default()),
            Some(_) => (spec.default_order.to_string(), Direction::Descending),
            None => (spec.default_order.to_string(), query.order.unwrap_or_default()),
        };

        let plan = |index: ScanIndex, range: KeyRange, sort_in_memory: bool, status_in_index: bool| Self {
            index,
            range,
            direction,
            order_by: order_by.clone(),
            sort_in_memory,
            status_in_index,
        };

        if spec.key_field == Some(order_by.as_str()) {
            return plan(ScanIndex::Primary, KeyRange::all(), false, false);
        }

        if let Some(column) = spec.column_for_field(&order_by).filter(|c| !c.nullable) {
            let status_column = spec
                .status_field
                .and_then(|field| spec.column_for_field(field));
            if let (Some(status), Some(status_column), ColumnType::Timestamp) =
                (&query.status, status_column, column.ty)
            {
                if let Some(index) = spec.compound_index_on(status_column.column, column.column) {
                    return plan(
                        ScanIndex::named(index.name),
                        KeyRange::only(SqlValue::Text(status.clone())),
                        false,
                        true,
                    );
                }
            }
            if let Some(index) = spec.single_index_on(column.column) {
                return plan(ScanIndex::named(index.name), KeyRange::all(), false, false);
            }
        }

        plan(ScanIndex::Primary, KeyRange::all(), true, false)
    }
}

impl<T: StoredEntity> EntityStore<T> {
    pub fn plan(&self, query: &QuerySpec) -> QueryPlan {
        QueryPlan::build(self.spec(), query)
    }

    /// Run a query and return one page plus the total match count.
    ///
    /// See [`QueryPage`] for how corrupt rows affect `total`.
    pub fn query(&self, query: &QuerySpec) -> StorageResult<QueryPage<T>> {
        let plan = self.plan(query);
        let filter = ResidualFilter::new(self.spec(), query, &plan);
        debug!(
            kind = %T::KIND,
            index = ?plan.index,
            order_by = %plan.order_by,
            sort_in_memory = plan.sort_in_memory,
            residual = !filter.is_empty(),
            "query"
        );

        if filter.is_empty() && !plan.sort_in_memory {
            let total = self.count(&plan.index, &plan.range)?;
            let window = query.limit.map(|limit| query.offset.saturating_add(limit));
            let mut items = Vec::new();
            for row in self
                .raw_scan(&plan.index, &plan.range, plan.direction, window)?
                .skip(query.offset)
            {
                items.push(decode_entity(row?.document)?);
            }
            return Ok(QueryPage { items, total });
        }

        let mut matches: Vec<(EntityKey, Value)> = Vec::new();
        for row in self.raw_scan(&plan.index, &plan.range, plan.direction, None)? {
            let row = row?;
            if filter.matches(&row.document) {
                matches.push((row.key, row.document));
            }
        }

        if plan.sort_in_memory {
            let field = plan.order_by.as_str();
            matches.sort_by(|(ka, a), (kb, b)| {
                let ordering = compare_field(a.get(field), b.get(field)).then_with(|| ka.cmp(kb));
                match plan.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        let total = matches.len();
        let limit = query.limit.unwrap_or(usize::MAX);
        let items = matches
            .into_iter()
            .skip(query.offset)
            .take(limit)
            .map(|(_, document)| decode_entity(document))
            .collect::<StorageResult<Vec<T>>>()?;
        Ok(QueryPage { items, total })
    }
}

/// Everything the chosen index does not answer.
struct ResidualFilter<'a> {
    spec: &'static TableSpec,
    search: Option<String>,
    status: Option<&'a str>,
    tags: Vec<String>,
    predicates: &'a [Predicate],
}

impl<'a> ResidualFilter<'a> {
    fn new(spec: &'static TableSpec, query: &'a QuerySpec, plan: &QueryPlan) -> Self {
        Self {
            spec,
            search: query
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase),
            status: query.status.as_deref().filter(|_| !plan.status_in_index),
            tags: query
                .tags
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            predicates: &query.predicates,
        }
    }

    fn is_empty(&self) -> bool {
        self.search.is_none() && self.status.is_none() && self.tags.is_empty() && self.predicates.is_empty()
    }

    fn matches(&self, document: &Value) -> bool {
        if let Some(needle) = &self.search {
            let hit = self
                .spec
                .search_fields
                .iter()
                .any(|field| document.get(*field).is_some_and(|v| value_contains(v, needle)));
            if !hit {
                return false;
            }
        }

        if let Some(status) = self.status {
            let field = self.spec.status_field.and_then(|f| document.get(f));
            if field.and_then(Value::as_str) != Some(status) {
                return false;
            }
        }

        if !self.tags.is_empty() {
            let values = self
                .spec
                .multi_field
                .and_then(|f| document.get(f))
                .and_then(Value::as_array);
            let Some(values) = values else {
                return false;
            };
            let all = self
                .tags
                .iter()
                .all(|tag| values.iter().any(|v| value_contains(v, tag)));
            if !all {
                return false;
            }
        }

        self.predicates.iter().all(|p| p.matches(document))
    }
}

/// Case-insensitive substring match; `needle` is already lowercase.
fn value_contains(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Number(n) => n.to_string().contains(needle),
        Value::Array(items) => items.iter().any(|item| value_contains(item, needle)),
        _ => false,
    }
}

/// Order for in-memory sorting. Missing and null sort first.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => match (as_number(x), as_number(y)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => x.to_string().cmp(&y.to_string()),
        },
    }
}
