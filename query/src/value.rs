//! Value coercions shared by both evaluation backends.
//!
//! Filter values and in-memory record values go through the same functions,
//! so a comparison means the same thing whether it runs in SQL or in process.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// A bound statement parameter. Values never appear in SQL text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

/// SQL text plus the parameters for its `$n` placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// ASCII case folding, matching SQLite `LOWER()` and `LIKE`.
pub fn fold_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_ascii_lowercase()),
        Value::Number(n) => Some(n.to_string().to_ascii_lowercase()),
        _ => None,
    }
}

/// Normalizes an `in` operand. A comma separated string is split and trimmed;
/// duplicates are removed keeping first occurrence.
pub fn fold_text_list(value: &Value) -> Vec<String> {
    let items: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(fold_text).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_ascii_lowercase)
            .collect(),
        other => fold_text(other).into_iter().collect(),
    };

    let mut unique = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

pub fn to_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// A number held by a record. Text never counts, because SQLite orders TEXT
/// after every numeric value instead of converting it.
pub fn stored_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        _ => None,
    }
}

pub fn to_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// A flag held by a record: a boolean, or the 0/1 SQLite stores.
pub fn stored_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Day part of an ISO-8601 date or timestamp, taken from its leading
/// `YYYY-MM-DD` exactly as `SUBSTR(col, 1, 10)` does. Only the zero-padded
/// form of a real calendar day is accepted, which is what SQLite's `date()`
/// gives back unchanged.
pub fn to_day(value: &Value) -> Option<NaiveDate> {
    let Value::String(s) = value else {
        return None;
    };
    let day = s.get(..10)?;
    let padded = day.bytes().enumerate().all(|(i, b)| match i {
        4 | 7 => b == b'-',
        _ => b.is_ascii_digit(),
    });
    if !padded {
        return None;
    }
    NaiveDate::parse_from_str(day, DAY_FORMAT).ok()
}

/// Escapes LIKE wildcards so the needle matches literally with `ESCAPE '\'`.
pub fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
