//! Index selection and key ranges for scans.

use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};
use std::ops::Bound;

/// Which index a scan walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanIndex {
    /// The primary key.
    Primary,
    /// A declared secondary index, by its short name (e.g. `status_updated_at`).
    Named(String),
}

impl ScanIndex {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "asc")]
    Ascending,
    #[default]
    #[serde(rename = "desc")]
    Descending,
}

impl Direction {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// A range over an index: equality on the leading columns, then optional
/// bounds on the column that follows them.
///
/// `KeyRange::only("viewed").lower(from, true).upper(to, false)` on a
/// `(status, updated_at)` index selects viewed rows with
/// `from <= updated_at < to`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRange {
    pub prefix: Vec<SqlValue>,
    pub lower: Bound<SqlValue>,
    pub upper: Bound<SqlValue>,
}

impl KeyRange {
    /// Every row the index holds.
    pub fn all() -> Self {
        Self {
            prefix: Vec::new(),
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// Rows whose leading column equals `value`.
    pub fn only(value: impl Into<SqlValue>) -> Self {
        Self::with_prefix(vec![value.into()])
    }

    pub fn with_prefix(prefix: Vec<SqlValue>) -> Self {
        Self {
            prefix,
            ..Self::all()
        }
    }

    pub fn lower(mut self, value: impl Into<SqlValue>, inclusive: bool) -> Self {
        let value = value.into();
        self.lower = if inclusive { Bound::Included(value) } else { Bound::Excluded(value) };
        self
    }

    pub fn upper(mut self, value: impl Into<SqlValue>, inclusive: bool) -> Self {
        let value = value.into();
        self.upper = if inclusive { Bound::Included(value) } else { Bound::Excluded(value) };
        self
    }

    pub(crate) fn is_bounded(&self) -> bool {
        !matches!(
            (&self.lower, &self.upper),
            (Bound::Unbounded, Bound::Unbounded)
        )
    }
}

impl Default for KeyRange {
    fn default() -> Self {
        Self::all()
    }
}
