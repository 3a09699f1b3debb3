//! Epoch-millisecond helpers and calendar keys.

use chrono::{DateTime, NaiveDate, Utc};

pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Current time in milliseconds since Unix epoch.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// `YYYY-MM-DD` (UTC) for an epoch-millisecond timestamp.
pub fn day_key(ts_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts_ms)
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

/// `YYYY-MM` (UTC) for an epoch-millisecond timestamp.
pub fn month_key(ts_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts_ms)
        .unwrap_or_default()
        .format("%Y-%m")
        .to_string()
}

pub fn is_valid_day_key(key: &str) -> bool {
    key.len() == 10 && NaiveDate::parse_from_str(key, "%Y-%m-%d").is_ok()
}

pub fn is_valid_month_key(key: &str) -> bool {
    key.len() == 7 && NaiveDate::parse_from_str(&format!("{key}-01"), "%Y-%m-%d").is_ok()
}
