//! Cell formatting helpers.
//!
//! Pure functions turning row values into display text; no ratatui styles here.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

pub fn format_bool(b: bool) -> &'static str {
    if b { "✔" } else { "✘" }
}

/// Sorted, comma-joined feature list.
pub fn format_features(features: &[String]) -> String {
    let mut sorted: Vec<&str> = features.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(", ")
}

/// Generic JSON value: strings verbatim, `null` as `"-"`, the rest as JSON.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => normalize_for_display(s),
        Value::Bool(b) => format_bool(*b).to_string(),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Parses RFC 3339 and the `YYYY-MM-DD HH:MM:SS` form Postgres uses for
/// `timestamp` columns (taken as UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .map(|naive| naive.and_utc())
}

/// Local `YYYY-MM-DD HH:MM:SS`, or the raw value when it is not a timestamp.
pub fn format_datetime(value: &Value) -> String {
    match value.as_str().and_then(parse_timestamp) {
        Some(dt) => dt
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => format_value(value),
    }
}

/// Compact age: `"3s ago"`, `"5m ago"`, `"2h ago"`, `"7d ago"`.
pub fn format_age(value: &Value, now: DateTime<Utc>) -> String {
    let Some(dt) = value.as_str().and_then(parse_timestamp) else {
        return format_value(value);
    };
    let age = (now - dt).num_seconds();
    if age < 0 {
        return "just now".to_string();
    }
    if age < 60 {
        format!("{}s ago", age)
    } else if age < 3600 {
        format!("{}m ago", age / 60)
    } else if age < 86400 {
        format!("{}h ago", age / 3600)
    } else {
        format!("{}d ago", age / 86400)
    }
}

// ---------------------------------------------------------------------------
// Text normalization
// ---------------------------------------------------------------------------

/// Truncate to `max_len` characters with `…`.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

/// Single-line display: control whitespace becomes spaces, runs collapse.
pub fn normalize_for_display(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        let ch = if matches!(ch, '\n' | '\r' | '\t') { ' ' } else { ch };
        if ch == ' ' {
            if !prev_space {
                result.push(ch);
            }
            prev_space = true;
        } else {
            result.push(ch);
            prev_space = false;
        }
    }
    result
}
