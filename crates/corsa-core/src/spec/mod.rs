// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The spec protocol: typed-but-extensible configuration objects.
//!
//! Every entity (function, task, run) carries a spec: a set of declared,
//! typed fields plus an extra-fields bag holding every key the type does not
//! claim. Round-tripping through [`ConfigurableSpec::to_map`] and
//! [`ConfigurableSpec::configure`] never drops caller-supplied data, which is
//! what keeps the control plane forward-compatible with backend kinds it has
//! never seen.

pub mod registry;

pub use registry::{EntityType, SpecRegistry};

use std::any::Any;
use std::fmt;

use serde_json::Value;

use crate::error::CoreError;

/// Open key-value map used for spec payloads.
pub type SpecMap = serde_json::Map<String, Value>;

/// A configuration object that can be loaded from and dumped to an open map.
///
/// Contract:
/// - `configure` assigns every declared field from `data` and stashes every
///   unclaimed key into the extra-fields bag; calling it twice with the same
///   map yields the same object.
/// - `to_map` merges declared fields over the extra bag; declared fields win
///   on key collision.
/// - `configure(to_map(x))` reproduces `x`, extras included.
pub trait ConfigurableSpec: fmt::Debug + Send + Sync {
    /// Load this spec from an open map.
    fn configure(&mut self, data: &SpecMap) -> Result<(), CoreError>;

    /// Dump this spec to an open map, extras included.
    fn to_map(&self) -> SpecMap;
}

/// A [`ConfigurableSpec`] produced by the registry, downcastable to its
/// concrete type by the backend that registered it.
pub trait EntitySpec: ConfigurableSpec {
    /// Borrow as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T> EntitySpec for T
where
    T: ConfigurableSpec + Any,
{
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Remove and return a string field from a working map.
pub fn take_string(data: &mut SpecMap, key: &str) -> Option<String> {
    match data.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
        None => None,
    }
}

/// Remove and return a string-array field from a working map.
///
/// Missing keys and non-array values yield an empty vector; scalar elements
/// are stringified rather than dropped.
pub fn take_string_vec(data: &mut SpecMap, key: &str) -> Vec<String> {
    match data.remove(key) {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Remove and return an integer field from a working map.
pub fn take_u64(data: &mut SpecMap, key: &str) -> Option<u64> {
    data.remove(key).and_then(|v| v.as_u64())
}

/// Remove and return a nested object field from a working map.
pub fn take_map(data: &mut SpecMap, key: &str) -> Option<SpecMap> {
    match data.remove(key) {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Insert a field into an output map unless it is `None`.
pub fn put_opt(out: &mut SpecMap, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        out.insert(key.to_string(), Value::String(v.to_string()));
    }
}

/// Insert a string-array field into an output map unless it is empty.
pub fn put_vec(out: &mut SpecMap, key: &str, values: &[String]) {
    if !values.is_empty() {
        out.insert(
            key.to_string(),
            Value::Array(values.iter().cloned().map(Value::String).collect()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> SpecMap {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    /// Minimal spec with one declared field, used to exercise the contract.
    #[derive(Debug, Default, Clone, PartialEq)]
    struct ProbeSpec {
        image: Option<String>,
        extra: SpecMap,
    }

    impl ConfigurableSpec for ProbeSpec {
        fn configure(&mut self, data: &SpecMap) -> Result<(), CoreError> {
            let mut data = data.clone();
            self.image = take_string(&mut data, "image");
            self.extra = data;
            Ok(())
        }

        fn to_map(&self) -> SpecMap {
            let mut out = self.extra.clone();
            put_opt(&mut out, "image", self.image.as_deref());
            out
        }
    }

    #[test]
    fn round_trip_preserves_unknown_keys() {
        let data = map(json!({
            "image": "ghcr.io/acme/trainer:v2",
            "gpu_profile": "a100",
            "nested": {"mounts": ["/data"]},
        }));

        let mut spec = ProbeSpec::default();
        spec.configure(&data).unwrap();
        assert_eq!(spec.image.as_deref(), Some("ghcr.io/acme/trainer:v2"));
        assert_eq!(spec.extra.len(), 2);

        let mut again = ProbeSpec::default();
        again.configure(&spec.to_map()).unwrap();
        assert_eq!(spec, again);
    }

    #[test]
    fn configure_is_idempotent() {
        let data = map(json!({"image": "x", "keep": 1}));
        let mut spec = ProbeSpec::default();
        spec.configure(&data).unwrap();
        let first = spec.clone();
        spec.configure(&data).unwrap();
        assert_eq!(spec, first);
    }

    #[test]
    fn declared_fields_win_on_collision() {
        let mut spec = ProbeSpec {
            image: Some("declared".to_string()),
            extra: map(json!({"image": "stale"})),
        };
        // A stale extra entry under a declared key must not survive to_map.
        let out = spec.to_map();
        assert_eq!(out.get("image"), Some(&json!("declared")));
        spec.configure(&out.clone()).unwrap();
        assert_eq!(spec.image.as_deref(), Some("declared"));
        assert!(!spec.extra.contains_key("image"));
    }

    #[test]
    fn take_helpers_handle_absent_and_mistyped() {
        let mut data = map(json!({"n": 3, "args": ["a", 1]}));
        assert_eq!(take_string(&mut data, "missing"), None);
        assert_eq!(take_u64(&mut data, "n"), Some(3));
        assert_eq!(take_string_vec(&mut data, "args"), vec!["a", "1"]);
        assert!(take_map(&mut data, "args").is_none());
    }
}
