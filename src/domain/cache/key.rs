//! Key space policy - deterministic, tenant-scoped cache keys

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::namespace::Namespace;
use crate::domain::tenant::TenantId;

/// Serialized parameter strings longer than this are replaced by a hash
pub const MAX_PARAMS_LENGTH: usize = 128;

/// Marker used in place of a user id for unauthenticated callers
pub const ANONYMOUS_USER: &str = "anon";

/// Parameters for cache key generation (filters, pagination, ...)
///
/// Components live in a sorted map, so insertion order never affects the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheKeyParams {
    components: BTreeMap<String, String>,
}

impl CacheKeyParams {
    /// Creates empty parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a component; empty values are dropped
    pub fn with_component(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds an optional component; `None` and empty values are dropped
    pub fn with_optional(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.with_component(key, value),
            None => self,
        }
    }

    /// Inserts a component in place; empty values are dropped
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        if key.is_empty() || value.trim().is_empty() {
            return;
        }

        self.components.insert(key, value);
    }

    /// Creates parameters from any iterator of pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (k, v) in pairs {
            params.insert(k, v);
        }
        params
    }

    /// Creates parameters from the top-level fields of a serializable value.
    ///
    /// Null values are omitted; nested values are embedded as compact JSON.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_value(value)?;
        let mut params = Self::new();

        if let serde_json::Value::Object(map) = json {
            for (k, v) in map {
                match v {
                    serde_json::Value::Null => {}
                    serde_json::Value::String(s) => params.insert(k, s),
                    other => params.insert(k, other.to_string()),
                }
            }
        }

        Ok(params)
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.components.get(key).map(String::as_str)
    }

    /// Canonical string form: `k1=v1&k2=v2`, keys in lexicographic order.
    ///
    /// Falls back to a hash when a component contains characters that are not
    /// safe inside a key, or when the result is too long.
    pub fn serialize(&self) -> String {
        let joined = self
            .components
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let all_safe = self
            .components
            .iter()
            .all(|(k, v)| is_safe_component(k) && is_safe_component(v));

        if all_safe && joined.len() <= MAX_PARAMS_LENGTH {
            joined
        } else {
            hash_segment(&joined)
        }
    }
}

fn is_safe_component(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ',' | '/' | '-'))
}

fn is_safe_operation(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ',' | '/' | '-' | ':'))
}

/// `h` followed by the first 16 bytes of the SHA-256 digest, hex encoded
fn hash_segment(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    format!("h{}", hex::encode(&digest[..16]))
}

/// Unsafe operations are hashed. A safe leading segment stays in clear text
/// (`properties/h<hash>`), so collection patterns still match the key.
fn key_operation(operation: &str) -> String {
    if is_safe_operation(operation) {
        return operation.to_string();
    }

    match operation.split_once('/') {
        Some((head, _)) if is_safe_operation(head) => {
            format!("{}/{}", head, hash_segment(operation))
        }
        _ => hash_segment(operation),
    }
}

/// Builds `{namespace}:{tenant}:{operation}[:{params}]`.
///
/// Pure and deterministic: the same logical query always yields the same key.
pub fn build_key(
    namespace: Namespace,
    tenant: &TenantId,
    operation: &str,
    params: &CacheKeyParams,
) -> String {
    let operation = key_operation(operation);

    let mut key = format!("{}:{}:{}", namespace.as_str(), tenant.as_str(), operation);

    if !params.is_empty() {
        key.push(':');
        key.push_str(&params.serialize());
    }

    key
}

/// Normalizes a request path into a key operation.
///
/// Drops empty segments, a trailing slash and a leading API version segment
/// (`v1`, `v2`, ...), so `/v1/properties/` becomes `properties`.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if let Some(first) = segments.first() {
        let is_version = first.len() > 1
            && first.starts_with('v')
            && first[1..].chars().all(|c| c.is_ascii_digit());

        if is_version {
            segments.remove(0);
        }
    }

    if segments.is_empty() {
        "root".to_string()
    } else {
        segments.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> TenantId {
        TenantId::new("acme").unwrap()
    }

    #[test]
    fn test_cache_key_params_with_components() {
        let params = CacheKeyParams::new()
            .with_component("status", "active")
            .with_component("city", "leeds");

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("status"), Some("active"));
    }

    #[test]
    fn test_empty_values_are_omitted() {
        let params = CacheKeyParams::new()
            .with_component("status", "")
            .with_component("city", "   ")
            .with_optional("owner", None::<String>)
            .with_component("page", "1");

        assert_eq!(params.serialize(), "page=1");
    }

    #[test]
    fn test_components_are_sorted() {
        let params = CacheKeyParams::new()
            .with_component("zebra", "z")
            .with_component("apple", "a")
            .with_component("mango", "m");

        assert_eq!(params.serialize(), "apple=a&mango=m&zebra=z");
    }

    #[test]
    fn test_build_key_is_order_independent() {
        let pairs = [("status", "active"), ("city", "leeds"), ("beds", "2"), ("sort", "rent")];

        let forward = CacheKeyParams::from_pairs(pairs);
        let backward = CacheKeyParams::from_pairs(pairs.iter().rev().copied());
        let shuffled = CacheKeyParams::from_pairs([pairs[2], pairs[0], pairs[3], pairs[1]]);

        let a = build_key(Namespace::Properties, &acme(), "list", &forward);
        let b = build_key(Namespace::Properties, &acme(), "list", &backward);
        let c = build_key(Namespace::Properties, &acme(), "list", &shuffled);

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a, "properties:acme:list:beds=2&city=leeds&sort=rent&status=active");
    }

    #[test]
    fn test_build_key_without_params() {
        let key = build_key(Namespace::Dashboard, &acme(), "stats", &CacheKeyParams::new());
        assert_eq!(key, "dashboard:acme:stats");
    }

    #[test]
    fn test_unsafe_values_are_hashed() {
        let params = CacheKeyParams::new().with_component("search", "main st*");
        let serialized = params.serialize();

        assert!(serialized.starts_with('h'));
        assert_eq!(serialized.len(), 33);
        assert!(!serialized.contains('*'));
    }

    #[test]
    fn test_ambiguous_separators_are_hashed() {
        let a = CacheKeyParams::new().with_component("a=b", "c");
        let b = CacheKeyParams::new().with_component("a", "b=c");

        assert_ne!(a.serialize(), b.serialize());
    }

    #[test]
    fn test_long_params_are_hashed_deterministically() {
        let value = "x".repeat(MAX_PARAMS_LENGTH + 10);
        let a = CacheKeyParams::new().with_component("q", value.clone());
        let b = CacheKeyParams::new().with_component("q", value);

        assert_eq!(a.serialize(), b.serialize());
        assert!(a.serialize().starts_with('h'));
    }

    #[test]
    fn test_unsafe_operation_is_hashed() {
        let key = build_key(Namespace::Api, &acme(), "prop[1]*", &CacheKeyParams::new());
        assert!(key.starts_with("api:acme:h"));
        assert!(!key.contains('*'));
    }

    #[test]
    fn test_unsafe_operation_keeps_collection_segment() {
        let a = build_key(Namespace::Api, &acme(), "properties/main%20st", &CacheKeyParams::new());
        let b = build_key(Namespace::Api, &acme(), "properties/main+st", &CacheKeyParams::new());

        assert!(a.starts_with("api:acme:properties/h"));
        assert_ne!(a, b);
        assert!(crate::domain::cache::build_pattern(Namespace::Api, &acme(), Some("properties"))
            .unwrap()
            .matches(&a));
    }

    #[test]
    fn test_from_serializable() {
        #[derive(Serialize)]
        struct Filters {
            status: Option<String>,
            owner: Option<String>,
            beds: u32,
        }

        let filters = Filters {
            status: Some("vacant".to_string()),
            owner: None,
            beds: 3,
        };

        let params = CacheKeyParams::from_serializable(&filters).unwrap();
        assert_eq!(params.serialize(), "beds=3&status=vacant");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/v1/properties/"), "properties");
        assert_eq!(normalize_path("/v2/properties//42"), "properties/42");
        assert_eq!(normalize_path("/properties"), "properties");
        assert_eq!(normalize_path("/vacancies"), "vacancies");
        assert_eq!(normalize_path("/"), "root");
    }
}
