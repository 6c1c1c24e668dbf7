//! Canonical JSON encoding.
//!
//! The rule: object keys sorted lexicographically (recursively), UTC
//! timestamps serialized with a trailing `Z`, and no insignificant
//! whitespace. This is the sole input to both signing and hashing for
//! verifiable credentials — two implementations that canonicalize the same
//! logical document must produce byte-identical output.

use serde::Serialize;
use serde_json::Value;

use crate::error::AgoriaError;

/// Serialize `value` to its canonical JSON byte form.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, AgoriaError> {
    let raw = serde_json::to_value(value).map_err(|e| AgoriaError::Serialization(e.to_string()))?;
    let sorted = sort_keys(raw);
    serde_json::to_vec(&sorted).map_err(|e| AgoriaError::Serialization(e.to_string()))
}

/// Serialize `value` to a canonical JSON string.
pub fn to_canonical_string<T: Serialize>(value: &T) -> Result<String, AgoriaError> {
    let bytes = to_canonical_bytes(value)?;
    String::from_utf8(bytes).map_err(|e| AgoriaError::Serialization(e.to_string()))
}

/// Recursively rewrite a `Value` so every object is a `BTreeMap`-ordered
/// (i.e. key-sorted) object. `serde_json::Value`'s `Map` preserves
/// insertion order when the `preserve_order` feature is active anywhere in
/// the dependency graph, so we never rely on the default — we sort
/// explicitly every time.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = serde_json::Map::new();
            for (k, v) in entries {
                sorted.insert(k, v);
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Format a UTC instant the way canonical documents require: RFC 3339 with
/// a literal trailing `Z` and no sub-second component.
pub fn format_timestamp(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Unordered {
        zeta: u32,
        alpha: u32,
        nested: Nested,
    }

    #[derive(Serialize)]
    struct Nested {
        b: u32,
        a: u32,
    }

    #[test]
    fn sorts_keys_recursively() {
        let value = Unordered {
            zeta: 1,
            alpha: 2,
            nested: Nested { b: 3, a: 4 },
        };
        let s = to_canonical_string(&value).unwrap();
        assert_eq!(s, r#"{"alpha":2,"nested":{"a":4,"b":3},"zeta":1}"#);
    }

    #[test]
    fn encode_is_deterministic() {
        let value = Unordered {
            zeta: 1,
            alpha: 2,
            nested: Nested { b: 3, a: 4 },
        };
        let first = to_canonical_bytes(&value).unwrap();
        let second = to_canonical_bytes(&value).unwrap();
        assert_eq!(first, second);
    }
}
