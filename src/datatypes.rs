//! Payload classification and normalization
//!
//! Cages only accept strict JSON objects as run payloads: arrays, raw
//! strings, numbers and null are rejected before any request is made.

use serde_json::Value;

/// Whether a value is a strict object: a JSON map, not an array, not a
/// scalar, not null
pub fn is_object_strict(value: &Value) -> bool {
    value.is_object()
}

/// Whether a value carries data at all
pub fn is_defined(value: &Value) -> bool {
    !value.is_null()
}

/// Coerce a value into a string for providers that operate on text.
///
/// Strings pass through trimmed; everything else is JSON-serialized.
pub fn ensure_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}
