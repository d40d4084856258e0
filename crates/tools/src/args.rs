//! Lenient argument readers shared by the built-in tools.
//!
//! Small models are sloppy with types: `"120"`, `120.0` and `"2 minutes"`
//! all show up where an integer was asked for. These helpers accept what
//! can be understood and return `None` for the rest so each tool can phrase
//! its own error text.

use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static FIRST_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").ok());

/// The first non-null value among `keys`, so aliases can be listed after
/// the canonical parameter name.
pub fn lookup<'a>(args: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| args.get(*k))
        .find(|v| !v.is_null())
}

/// Trimmed text form of a scalar; empty for null or missing.
pub fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

/// Like [`text`], falling back to `default` when empty.
pub fn text_or(value: Option<&Value>, default: &str) -> String {
    let t = text(value);
    if t.is_empty() { default.to_string() } else { t }
}

/// A positive whole number of seconds from ints, floats, or strings such
/// as `"10 secs"`. Fractions are truncated.
pub fn positive_seconds(value: &Value) -> Option<u64> {
    let seconds = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?,
        Value::String(s) => {
            let m = FIRST_NUMBER.as_ref()?.find(s)?;
            m.as_str().parse::<f64>().ok()?.trunc() as i64
        }
        _ => return None,
    };
    u64::try_from(seconds).ok().filter(|s| *s > 0)
}

/// An integer from a number or numeric string; `default` when missing.
/// Values outside the `i64` range are rejected rather than clamped.
pub fn integer_or(value: Option<&Value>, default: i64) -> Option<i64> {
    match value {
        None | Some(Value::Null) => Some(default),
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f))
                .map(|f| f as i64)
        }),
        Some(Value::String(s)) if s.trim().is_empty() => Some(default),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Items from an array or a comma/newline separated string, trimmed, with
/// empty entries dropped. `None` for any other shape.
pub fn items(value: &Value) -> Option<Vec<String>> {
    let raw: Vec<String> = match value {
        Value::Array(values) => values.iter().map(|v| text(Some(v))).collect(),
        Value::String(s) => s.split([',', '\n']).map(|p| p.trim().to_string()).collect(),
        _ => return None,
    };
    Some(raw.into_iter().filter(|s| !s.is_empty()).collect())
}
