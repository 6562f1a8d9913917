//! The cached `Value` tagged union and identifier/store-name validation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// A cacheable value.
///
/// Mirrors the spec's `{string, number, boolean, null, list, hash, json}`
/// tagged union. `Json` is the escape hatch for arbitrary nested JSON that
/// doesn't fit the concrete variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    #[serde(rename = "string")]
    String(String),
    #[serde(rename = "number")]
    Number(f64),
    #[serde(rename = "boolean")]
    Boolean(bool),
    #[serde(rename = "null")]
    Null,
    #[serde(rename = "list")]
    List(Vec<Value>),
    #[serde(rename = "hash")]
    Hash(HashMap<String, Value>),
    #[serde(rename = "json")]
    Json(serde_json::Value),
}

const MAX_NAME_LEN: usize = 10_000;
const RESERVED_TOKENS: [&str; 2] = ["__proto__", "*"];
const FORBIDDEN_SUBSTRINGS: [&str; 4] = ["../", "'", ";", "--"];

/// Validates an identifier per the T/A boundary rules: non-empty, bounded
/// length, no traversal/SQL-like punctuation, no reserved tokens.
pub fn validate_identifier(identifier: &str) -> Result<(), CacheError> {
    validate_name(identifier).map_err(CacheError::InvalidIdentifier)
}

/// Same rules as `validate_identifier`, for store names.
pub fn validate_store_name(store: &str) -> Result<(), CacheError> {
    validate_name(store).map_err(CacheError::InvalidStoreName)
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("must not be empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!(
            "length {} exceeds maximum of {MAX_NAME_LEN} bytes",
            name.len()
        ));
    }
    for token in RESERVED_TOKENS {
        if name.contains(token) {
            return Err(format!("'{name}' contains reserved token '{token}'"));
        }
    }
    for pattern in FORBIDDEN_SUBSTRINGS {
        if name.contains(pattern) {
            return Err(format!("'{name}' contains forbidden pattern '{pattern}'"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_names() {
        assert!(validate_identifier("user-123").is_ok());
        assert!(validate_store_name("sessions").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn rejects_oversized() {
        let long = "a".repeat(MAX_NAME_LEN + 1);
        assert!(validate_identifier(&long).is_err());
    }

    #[test]
    fn rejects_traversal_and_sql_punctuation() {
        assert!(validate_identifier("../etc/passwd").is_err());
        assert!(validate_identifier("a'b").is_err());
        assert!(validate_identifier("a;b").is_err());
        assert!(validate_identifier("a--b").is_err());
    }

    #[test]
    fn rejects_reserved_tokens() {
        assert!(validate_identifier("__proto__").is_err());
        assert!(validate_identifier("*").is_err());
    }

    #[test]
    fn rejects_reserved_tokens_as_substrings() {
        assert!(validate_identifier("x__proto__y").is_err());
        assert!(validate_identifier("cache*").is_err());
    }

    #[test]
    fn value_round_trips_through_json() {
        let v = Value::Hash(HashMap::from([(
            "k".to_string(),
            Value::List(vec![Value::Number(1.0), Value::Null]),
        )]));
        let bytes = serde_json::to_vec(&v).expect("serialize");
        let back: Value = serde_json::from_slice(&bytes).expect("deserialize");
        assert_eq!(v, back);
    }
}
