//! Change fingerprints for binary-bearing items
//!
//! Invoice and estimate PDFs are regenerated by the server on every request,
//! so their bytes are useless for change detection. The fingerprint hashes the
//! item's JSON instead, with keys sorted at every level and the top-level
//! `updated_at` field removed. `created_at` stays in.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Top-level fields left out of the fingerprint
pub const FINGERPRINT_EXCLUDED_FIELDS: &[&str] = &["updated_at"];

/// SHA-256 hex digest of an item's business data
pub fn item_fingerprint(item: &Value) -> String {
    let stripped = match item {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !FINGERPRINT_EXCLUDED_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    };

    let canonical = canonicalize(&stripped);
    let mut hasher = Sha256::new();
    // Serializing a Value cannot fail
    hasher.update(canonical.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-256 hex digest of raw bytes
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Rebuild a value with object keys in sorted order, recursively
fn canonicalize(value: &Value) -> Value {
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
