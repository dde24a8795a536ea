//! Cache key derivation
//!
//! A fingerprint is the SHA-256 of the compact JSON serialization of
//! `{"params": .., "query": ..}` after every object in it has had its keys
//! sorted. Two parameter maps holding the same pairs in a different
//! insertion order therefore produce the same key.

use crate::cache::types::{CacheKey, CacheParams};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Length of a fingerprint in hex characters
pub const KEY_HEX_LEN: usize = 64;

/// Derive the fingerprint for a query and its parameters
pub fn derive_key(query: &str, params: &CacheParams) -> CacheKey {
    let mut document = Map::new();
    document.insert("params".to_string(), Value::Object(params.clone()));
    document.insert("query".to_string(), Value::String(query.to_string()));

    let canonical = canonicalize(&Value::Object(document));

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Rebuild a JSON value with object keys sorted at every depth.
///
/// Array order is significant and preserved.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Check whether a string has the shape of a fingerprint
pub fn is_fingerprint(candidate: &str) -> bool {
    candidate.len() == KEY_HEX_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> CacheParams {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_key_shape() {
        let key = derive_key("what is rust", &CacheParams::new());
        assert_eq!(key.len(), KEY_HEX_LEN);
        assert!(is_fingerprint(&key));
    }

    #[test]
    fn test_key_is_deterministic() {
        let p = params(json!({"model": "sonar", "temperature": 0.2}));
        assert_eq!(derive_key("q", &p), derive_key("q", &p));
    }

    #[test]
    fn test_key_ignores_insertion_order() {
        let mut a = CacheParams::new();
        a.insert("model".into(), json!("sonar-pro"));
        a.insert("search_recency_filter".into(), json!("week"));
        a.insert("return_citations".into(), json!(true));
        a.insert("nested".into(), json!({"b": 1, "a": [3, 2, 1]}));

        let mut b = CacheParams::new();
        b.insert("nested".into(), json!({"a": [3, 2, 1], "b": 1}));
        b.insert("return_citations".into(), json!(true));
        b.insert("search_recency_filter".into(), json!("week"));
        b.insert("model".into(), json!("sonar-pro"));

        assert_eq!(derive_key("latest rust release", &a), derive_key("latest rust release", &b));
    }

    #[test]
    fn test_key_distinguishes_inputs() {
        let p = params(json!({"model": "sonar"}));
        let base = derive_key("q", &p);

        assert_ne!(base, derive_key("q2", &p));
        assert_ne!(base, derive_key("q", &params(json!({"model": "sonar-pro"}))));
        assert_ne!(base, derive_key("q", &CacheParams::new()));
        // array order is part of the identity
        assert_ne!(
            derive_key("q", &params(json!({"domains": ["a.com", "b.com"]}))),
            derive_key("q", &params(json!({"domains": ["b.com", "a.com"]}))),
        );
    }

    #[test]
    fn test_canonicalize_sorts_nested_objects() {
        let value = json!({"z": {"y": 1, "x": 2}, "a": [{"d": 1, "c": 2}]});
        let canonical = canonicalize(&value);
        assert_eq!(
            canonical.to_string(),
            r#"{"a":[{"c":2,"d":1}],"z":{"x":2,"y":1}}"#
        );
    }

    #[test]
    fn test_is_fingerprint() {
        assert!(is_fingerprint(&"a".repeat(64)));
        assert!(!is_fingerprint(&"A".repeat(64)));
        assert!(!is_fingerprint("stats"));
        assert!(!is_fingerprint(&"g".repeat(64)));
    }
}
