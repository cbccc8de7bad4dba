//! Loose-value coercion used by every configuration tier.
//!
//! Config files and command-line overrides both arrive as untyped
//! [`serde_json::Value`]s. These helpers turn one such value into the typed
//! field it feeds. Except for the boolean parser, a helper returning `None`
//! means "not defined at this tier" so the lower tier's value survives.

use serde_json::Value;

/// Permissive boolean parser.
///
/// `true`, `"true"`, `1`, `"1"`, `"on"` and `"yes"` are true. Everything else,
/// including a missing value, is false. There is no error path.
// A typo'd flag value silently reads as false; worth a warning at the CLI
// layer if this ever bites users.
pub fn ensure_boolean(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "1" | "on" | "yes"),
        Some(Value::Number(n)) => n.as_u64() == Some(1) || n.as_f64() == Some(1.0),
        _ => false,
    }
}

/// Stringify a scalar. `null` is undefined; arrays and objects are rendered
/// as compact JSON.
pub fn to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Parse a TCP port from an integer or a numeric string.
pub fn to_port(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse an algorithm list from an array or a comma-separated string.
///
/// Entries are trimmed, blanks dropped and duplicates removed keeping the
/// first occurrence. An empty result is treated as undefined.
pub fn to_algorithms(value: &Value) -> Option<Vec<String>> {
    let raw: Vec<String> = match value {
        Value::Null => return None,
        Value::Array(items) => items.iter().filter_map(to_string).collect(),
        other => to_string(other)?
            .split(',')
            .map(str::to_owned)
            .collect(),
    };

    let mut algorithms: Vec<String> = Vec::with_capacity(raw.len());
    for name in raw.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !algorithms.iter().any(|a| a == name) {
            algorithms.push(name.to_owned());
        }
    }

    if algorithms.is_empty() {
        None
    } else {
        Some(algorithms)
    }
}
