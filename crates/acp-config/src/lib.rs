//! acp-config
//!
//! Layered configuration for the provisioner.
//!
//! Two stages, kept apart so each can be tested on its own:
//! 1. [`load_layered`] merges one or more YAML/JSON documents (later documents
//!    override earlier ones) and hashes the canonical form.
//! 2. [`resolve`] applies the environment overlay, fills defaults and validates,
//!    producing a [`ProvisionConfig`]. Every configuration error surfaces here,
//!    before any network call is made.

mod env;
mod model;
mod resolve;

pub use env::{EnvSource, MapEnv, ProcessEnv};
pub use model::*;
pub use resolve::{
    host_for_env, resolve, resolve_from_process_env, DEFAULT_API_ENV, DEFAULT_API_VERSION,
    SUPPORTED_PLATFORMS,
};

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;

/// Pointers of leaves that carry the API token. Redacted before printing.
const TOKEN_POINTERS: &[&str] = &["/token", "/api/token"];

pub const REDACTED: &str = "<REDACTED>";

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw = fs::read_to_string(p).with_context(|| format!("failed to read config path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_from_strings(&doc_refs)
}

/// Merge documents in order: earlier docs are base, later docs override.
///
/// JSON documents are valid YAML, so both formats go through the YAML parser.
/// Key order inside each mapping is preserved; it drives processing order.
pub fn load_layered_from_strings(docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Map::new());
    for raw in docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml/json")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        if v_json.is_null() {
            continue;
        }
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Copy of `v` with every token leaf replaced by [`REDACTED`].
pub fn redacted_json(v: &Value) -> Value {
    let mut out = v.clone();
    for ptr in TOKEN_POINTERS {
        if let Some(leaf) = out.pointer_mut(ptr) {
            if !leaf.is_null() {
                *leaf = Value::String(REDACTED.to_string());
            }
        }
    }
    out
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// Canonical form: object keys sorted recursively, compact rendering.
/// Insertion order is kept in `config_json`; only the hash input is sorted.
fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(&sorted_keys(v)).context("canonical json serialize failed")
}

fn sorted_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                out.insert(k.clone(), sorted_keys(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sorted_keys).collect()),
        other => other.clone(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn later_documents_override_earlier_ones() {
        let base = "organization: acme\napi:\n  env: PROD\n  version: v0.1\n";
        let over = r#"{"api": {"env": "INT"}}"#;
        let loaded = load_layered_from_strings(&[base, over]).unwrap();
        assert_eq!(loaded.config_json["organization"], "acme");
        assert_eq!(loaded.config_json["api"]["env"], "INT");
        assert_eq!(loaded.config_json["api"]["version"], "v0.1");
    }

    #[test]
    fn empty_document_is_ignored() {
        let loaded = load_layered_from_strings(&["organization: acme", ""]).unwrap();
        assert_eq!(loaded.config_json["organization"], "acme");
    }

    #[test]
    fn merge_preserves_declaration_order() {
        let doc = "iOS:\n  applications:\n    Zeta: {}\n    Alpha: {}\n    Mid: {}\n";
        let loaded = load_layered_from_strings(&[doc]).unwrap();
        let names: Vec<&String> = loaded.config_json["iOS"]["applications"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn hash_ignores_key_order() {
        let a = load_layered_from_strings(&[r#"{"a": 1, "b": {"x": 1, "y": 2}}"#]).unwrap();
        let b = load_layered_from_strings(&[r#"{"b": {"y": 2, "x": 1}, "a": 1}"#]).unwrap();
        assert_eq!(a.config_hash, b.config_hash);
        assert_eq!(a.config_hash.len(), 64);
    }

    #[test]
    fn redaction_covers_both_token_locations() {
        let v = json!({"token": "abc", "api": {"token": "def", "host": "h"}});
        let r = redacted_json(&v);
        assert_eq!(r["token"], REDACTED);
        assert_eq!(r["api"]["token"], REDACTED);
        assert_eq!(r["api"]["host"], "h");
    }

    #[test]
    fn redaction_leaves_absent_tokens_absent() {
        let r = redacted_json(&json!({"organization": "acme"}));
        assert!(r.get("token").is_none());
    }
}
