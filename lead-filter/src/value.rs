use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use std::borrow::Cow;

/// String coercion of a field value, as used by text and select operators.
///
/// Absent and null fields coerce to the empty string. Array elements are
/// joined with `", "` so tag lists stay searchable.
pub fn coerce_string(value: Option<&Value>) -> Cow<'_, str> {
    match value {
        None | Some(Value::Null) => Cow::Borrowed(""),
        Some(Value::String(s)) => Cow::Borrowed(s.as_str()),
        Some(Value::Number(num)) => Cow::Owned(num.to_string()),
        Some(Value::Bool(b)) => Cow::Owned(b.to_string()),
        Some(Value::Array(items)) => Cow::Owned(
            items
                .iter()
                .map(|item| coerce_string(Some(item)))
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Some(other @ Value::Object(_)) => Cow::Owned(other.to_string()),
    }
}

/// Null, absent and `""` are empty. `"0"` and `false` are not.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Parses a timestamp field.
///
/// Accepts RFC 3339, Postgres-style `2024-01-01 10:00:00+00`, naive
/// `YYYY-MM-DD HH:MM:SS` (taken as UTC), bare `YYYY-MM-DD` dates and JSON
/// numbers holding Unix epoch milliseconds.
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(num) => num
            .as_i64()
            .or_else(|| num.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Epoch milliseconds for sorting; missing or unparseable timestamps sort as
/// the epoch itself.
pub(crate) fn timestamp_millis_or_epoch(value: Option<&Value>) -> i64 {
    parse_timestamp(value)
        .map(|ts| ts.timestamp_millis())
        .unwrap_or(0)
}
