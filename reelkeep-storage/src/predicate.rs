//! Advanced field predicates evaluated against entity documents.
//!
//! String comparisons are case-insensitive. Numeric and length operators
//! are fail-closed: if either side does not parse as a number the row is
//! rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateOperator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    Empty,
    NotEmpty,
    Includes,
    IncludesAll,
    IncludesAny,
    LengthEq,
    LengthGt,
    LengthGte,
    LengthLt,
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
}

/// `{field, operator, value}` filter on one top-level document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub operator: PredicateOperator,
    #[serde(default)]
    pub value: Value,
}

impl Predicate {
    pub fn new(field: impl Into<String>, operator: PredicateOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn matches(&self, document: &Value) -> bool {
        let field = document.get(&self.field).unwrap_or(&Value::Null);
        let operand = &self.value;
        use PredicateOperator as Op;
        match self.operator {
            Op::Equals => values_equal(field, operand),
            Op::Contains => match field {
                Value::Array(items) => items.iter().any(|item| text_contains(item, operand)),
                other => text_contains(other, operand),
            },
            Op::StartsWith => text_pair(field, operand).is_some_and(|(f, o)| f.starts_with(&o)),
            Op::EndsWith => text_pair(field, operand).is_some_and(|(f, o)| f.ends_with(&o)),
            Op::Empty => is_empty(field),
            Op::NotEmpty => !is_empty(field),
            Op::Includes => match field {
                Value::Array(items) => items.iter().any(|item| values_equal(item, operand)),
                other => text_contains(other, operand),
            },
            Op::IncludesAll => match (field, operand) {
                (Value::Array(items), Value::Array(wanted)) => wanted
                    .iter()
                    .all(|w| items.iter().any(|item| values_equal(item, w))),
                _ => false,
            },
            Op::IncludesAny => match (field, operand) {
                (Value::Array(items), Value::Array(wanted)) => wanted
                    .iter()
                    .any(|w| items.iter().any(|item| values_equal(item, w))),
                _ => false,
            },
            Op::LengthEq => compare_length(field, operand, |l, r| l == r),
            Op::LengthGt => compare_length(field, operand, |l, r| l > r),
            Op::LengthGte => compare_length(field, operand, |l, r| l >= r),
            Op::LengthLt => compare_length(field, operand, |l, r| l < r),
            Op::Gt => compare_numbers(field, operand, |l, r| l > r),
            Op::Gte => compare_numbers(field, operand, |l, r| l >= r),
            Op::Lt => compare_numbers(field, operand, |l, r| l < r),
            Op::Lte => compare_numbers(field, operand, |l, r| l <= r),
            Op::Eq => compare_numbers(field, operand, |l, r| l == r),
        }
    }
}

/// A number, or a string that parses as one.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_lowercase()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_pair(field: &Value, operand: &Value) -> Option<(String, String)> {
    Some((as_text(field)?, as_text(operand)?))
}

fn text_contains(field: &Value, operand: &Value) -> bool {
    text_pair(field, operand).is_some_and(|(f, o)| f.contains(&o))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::String(l), Value::String(r)) => l.to_lowercase() == r.to_lowercase(),
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            matches!((as_number(left), as_number(right)), (Some(l), Some(r)) if l == r)
        }
        _ => left == right,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn length_of(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(items) => Some(items.len() as f64),
        Value::Null => Some(0.0),
        _ => None,
    }
}

fn compare_length(field: &Value, operand: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (length_of(field), as_number(operand)) {
        (Some(len), Some(wanted)) => cmp(len, wanted),
        _ => false,
    }
}

fn compare_numbers(field: &Value, operand: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (as_number(field), as_number(operand)) {
        (Some(l), Some(r)) => cmp(l, r),
        _ => false,
    }
}
