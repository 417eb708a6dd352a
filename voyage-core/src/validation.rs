//! Request-field checks shared by the HTTP handlers.
//!
//! Clients send numbers either as JSON numbers or as numeric strings (form
//! inputs), so numeric fields arrive as raw [`Value`]s and are coerced here.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Trimmed, non-empty text or `None`.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// A finite number from a JSON number or a numeric string.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// A non-negative price.
pub fn coerce_price(value: &Value) -> Option<f64> {
    coerce_number(value).filter(|p| *p >= 0.0)
}

/// A positive whole count (e.g. number of travellers).
pub fn coerce_count(value: &Value) -> Option<u32> {
    let n = coerce_number(value)?;
    if n < 1.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
        return None;
    }
    Some(n as u32)
}

/// A route from either a single location string or an array of location strings.
/// Blank stops are dropped; an empty result is rejected.
pub fn coerce_route(value: &Value) -> Option<Vec<String>> {
    let stops: Vec<String> = match value {
        Value::String(s) => vec![s.trim().to_string()],
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(|s| s.trim().to_string()))
            .collect::<Option<Vec<_>>>()?,
        _ => return None,
    };
    let stops: Vec<String> = stops.into_iter().filter(|s| !s.is_empty()).collect();
    (!stops.is_empty()).then_some(stops)
}
