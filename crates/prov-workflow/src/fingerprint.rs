//! Stable graph fingerprinting.
//!
//! Fingerprints identify the same workflow across copies: node ids change on
//! copy/paste, positions and colors are editor cosmetics, so a fixed set of
//! volatile keys is stripped at every nesting level before serialization.
//! The canonical form is JSON with keys sorted at every level and no
//! insignificant whitespace, hashed with SHA-1.

use derive_more::Display;
use serde::Serialize;
use serde_json::Value;
use sha1::{Digest, Sha1};

/// Keys dropped from every object during canonicalization.
pub const EXCLUDE_KEYS: &[&str] = &[
    "id",             // node ids change on copy/paste
    "pos",            // layout
    "size",           // layout
    "order",          // execution order varies
    "mode",           // active/muted state
    "properties",     // editor properties
    "color",          // cosmetics
    "bgcolor",        // cosmetics
    "flags",          // editor flags
    "widgets_values", // positional widget state, inputs carry the data
];

/// A graph fingerprint: digest plus the exact form that was hashed.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize)]
#[display("{hash}")]
pub struct Fingerprint {
    /// Lowercase 40-hex SHA-1, or empty when no fingerprint is derivable.
    pub hash: String,
    /// Canonical serialized form, kept for debugging and comparison.
    pub canonical: String,
}

impl Fingerprint {
    /// Fingerprints a graph document.
    pub fn of(document: &Value) -> Self {
        let canonical = canonicalize(document);
        Self {
            hash: hash_canonical(&canonical),
            canonical,
        }
    }

    /// Returns whether a usable hash was derived.
    pub fn is_present(&self) -> bool {
        !self.hash.is_empty()
    }
}

/// Hash algorithm disclosure, so an alternate implementation (e.g. a
/// browser-side one) can reproduce identical fingerprints.
#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmInfo {
    pub algorithm: &'static str,
    pub exclude_keys: &'static [&'static str],
    pub description: &'static str,
}

impl AlgorithmInfo {
    pub fn current() -> Self {
        Self {
            algorithm: "SHA1",
            exclude_keys: EXCLUDE_KEYS,
            description: "SHA-1 over volatile-key-stripped, key-sorted, compact JSON",
        }
    }
}

/// Serializes a document to its canonical form.
///
/// Map keys come out sorted because the JSON value type stores objects in
/// key order; serialization is compact with no added whitespace and leaves
/// non-ASCII text unescaped.
pub fn canonicalize(document: &Value) -> String {
    let stripped = strip_volatile(document);
    serde_json::to_string(&stripped).unwrap_or_default()
}

/// Hashes a document, returning `""` for degenerate input.
///
/// An empty canonical form is never hashed: callers treat `""` as "no
/// fingerprint available", distinct from any valid digest.
pub fn hash_document(document: &Value) -> String {
    hash_canonical(&canonicalize(document))
}

fn hash_canonical(canonical: &str) -> String {
    if canonical.is_empty() || matches!(canonical, "{}" | "[]" | "null") {
        return String::new();
    }
    let digest = Sha1::digest(canonical.as_bytes());
    hex::encode(digest)
}

/// Deep-copies a value, dropping volatile keys at every object level.
fn strip_volatile(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !EXCLUDE_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), strip_volatile(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_volatile).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workflow() -> Value {
        json!({
            "nodes": [
                {
                    "id": 4,
                    "type": "KSampler",
                    "pos": [100, 200],
                    "color": "#223",
                    "inputs": {"seed": 42, "steps": 20},
                },
            ],
            "last_node_id": 4,
        })
    }

    #[test]
    fn test_hash_is_stable_across_volatile_edits() {
        let mut moved = workflow();
        moved["nodes"][0]["id"] = json!(400);
        moved["nodes"][0]["pos"] = json!([999, -5]);
        moved["nodes"][0]["color"] = json!("#f00");

        let a = Fingerprint::of(&workflow());
        let b = Fingerprint::of(&moved);
        assert!(a.is_present());
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_changes_on_retained_fields() {
        let mut edited = workflow();
        edited["nodes"][0]["inputs"]["steps"] = json!(30);

        assert_ne!(hash_document(&workflow()), hash_document(&edited));
    }

    #[test]
    fn test_key_order_is_irrelevant() {
        let a = json!({"alpha": 1, "beta": {"x": 1, "y": 2}});
        let b = json!({"beta": {"y": 2, "x": 1}, "alpha": 1});
        assert_eq!(hash_document(&a), hash_document(&b));
    }

    #[test]
    fn test_degenerate_inputs_yield_empty_hash() {
        assert_eq!(hash_document(&json!({})), "");
        assert_eq!(hash_document(&json!([])), "");
        assert_eq!(hash_document(&Value::Null), "");
        // All-volatile content strips down to nothing meaningful.
        assert_eq!(hash_document(&json!({"id": 1, "pos": [0, 0]})), "");
    }

    #[test]
    fn test_hash_shape() {
        let hash = hash_document(&workflow());
        assert_eq!(hash.len(), 40);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_canonical_form_is_compact_and_sorted() {
        let canonical = canonicalize(&json!({"b": 1, "a": {"z": true, "k": "é"}}));
        assert_eq!(canonical, r#"{"a":{"k":"é","z":true},"b":1}"#);
    }

    #[test]
    fn test_algorithm_info() {
        let info = AlgorithmInfo::current();
        assert_eq!(info.algorithm, "SHA1");
        assert!(info.exclude_keys.contains(&"widgets_values"));
    }
}
