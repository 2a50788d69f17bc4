// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Keyed factory registry for spec types.
//!
//! Backend integrations register a factory per `(runtime, kind, entity)`
//! triple at process start; from then on every spec in the system is created
//! through [`SpecRegistry::create`], which keeps the core agnostic to the
//! open set of backend kinds.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::{CoreError, Result};
use crate::spec::{EntitySpec, SpecMap};

/// The entity axis of a spec registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    /// Function spec (what to run).
    Function,
    /// Task spec (how/where to run it).
    Task,
    /// Run spec (one resolved execution).
    Run,
}

impl EntityType {
    /// Lowercase name, as logged and reported.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Function => "function",
            EntityType::Task => "task",
            EntityType::Run => "run",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Factory producing an unconfigured spec instance.
pub type SpecFactory = Arc<dyn Fn() -> Box<dyn EntitySpec> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SpecKey {
    runtime: String,
    kind: String,
    entity: EntityType,
}

/// Registry resolving `(runtime, kind, entity)` to a spec factory.
///
/// Resolution precedence: exact `(runtime, kind, entity)` first, then
/// `(kind, entity)` under the generic (empty) runtime. Unknown pairs fail
/// with [`CoreError::UnknownSpecKind`].
#[derive(Default)]
pub struct SpecRegistry {
    factories: RwLock<HashMap<SpecKey, SpecFactory>>,
}

impl SpecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `(runtime, kind, entity)`.
    ///
    /// An empty `runtime` registers the generic fallback for the kind. A
    /// later registration under the same key replaces the earlier one.
    pub fn register<F, S>(&self, runtime: &str, kind: &str, entity: EntityType, factory: F)
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: EntitySpec + 'static,
    {
        let key = SpecKey {
            runtime: runtime.to_string(),
            kind: kind.to_string(),
            entity,
        };
        let erased: SpecFactory = Arc::new(move || Box::new(factory()));
        self.factories
            .write()
            .expect("spec registry lock poisoned")
            .insert(key, erased);
    }

    /// Create and configure a spec for `(runtime, kind, entity)` from `data`.
    pub fn create(
        &self,
        runtime: &str,
        kind: &str,
        entity: EntityType,
        data: &SpecMap,
    ) -> Result<Box<dyn EntitySpec>> {
        let factory = {
            let factories = self
                .factories
                .read()
                .expect("spec registry lock poisoned");
            let exact = SpecKey {
                runtime: runtime.to_string(),
                kind: kind.to_string(),
                entity,
            };
            factories
                .get(&exact)
                .or_else(|| {
                    factories.get(&SpecKey {
                        runtime: String::new(),
                        kind: kind.to_string(),
                        entity,
                    })
                })
                .cloned()
        };

        let factory = factory.ok_or_else(|| CoreError::UnknownSpecKind {
            runtime: runtime.to_string(),
            kind: kind.to_string(),
            entity: entity.as_str().to_string(),
        })?;

        let mut spec = factory();
        spec.configure(data)?;
        Ok(spec)
    }

    /// Create a spec under the generic runtime.
    pub fn create_generic(
        &self,
        kind: &str,
        entity: EntityType,
        data: &SpecMap,
    ) -> Result<Box<dyn EntitySpec>> {
        self.create("", kind, entity, data)
    }

    /// Whether any factory (exact or generic) exists for `(runtime, kind, entity)`.
    pub fn contains(&self, runtime: &str, kind: &str, entity: EntityType) -> bool {
        let factories = self
            .factories
            .read()
            .expect("spec registry lock poisoned");
        factories.contains_key(&SpecKey {
            runtime: runtime.to_string(),
            kind: kind.to_string(),
            entity,
        }) || factories.contains_key(&SpecKey {
            runtime: String::new(),
            kind: kind.to_string(),
            entity,
        })
    }
}

impl fmt::Debug for SpecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let factories = self
            .factories
            .read()
            .expect("spec registry lock poisoned");
        f.debug_struct("SpecRegistry")
            .field("registrations", &factories.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ConfigurableSpec, put_opt, take_string};
    use serde_json::json;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct NamedSpec {
        name: Option<String>,
        origin: &'static str,
        extra: SpecMap,
    }

    impl ConfigurableSpec for NamedSpec {
        fn configure(&mut self, data: &SpecMap) -> Result<()> {
            let mut data = data.clone();
            self.name = take_string(&mut data, "name");
            self.extra = data;
            Ok(())
        }

        fn to_map(&self) -> SpecMap {
            let mut out = self.extra.clone();
            put_opt(&mut out, "name", self.name.as_deref());
            out
        }
    }

    fn data() -> SpecMap {
        match json!({"name": "train", "unclaimed": true}) {
            serde_json::Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn exact_match_wins_over_generic() {
        let registry = SpecRegistry::new();
        registry.register("", "job", EntityType::Task, || NamedSpec {
            origin: "generic",
            ..NamedSpec::default()
        });
        registry.register("k8s", "job", EntityType::Task, || NamedSpec {
            origin: "k8s",
            ..NamedSpec::default()
        });

        let spec = registry.create("k8s", "job", EntityType::Task, &data()).unwrap();
        let spec = spec.as_any().downcast_ref::<NamedSpec>().unwrap();
        assert_eq!(spec.origin, "k8s");
        assert_eq!(spec.name.as_deref(), Some("train"));
    }

    #[test]
    fn falls_back_to_generic_runtime() {
        let registry = SpecRegistry::new();
        registry.register("", "job", EntityType::Task, || NamedSpec {
            origin: "generic",
            ..NamedSpec::default()
        });

        let spec = registry
            .create("slurm", "job", EntityType::Task, &data())
            .unwrap();
        let spec = spec.as_any().downcast_ref::<NamedSpec>().unwrap();
        assert_eq!(spec.origin, "generic");
    }

    #[test]
    fn unknown_kind_fails() {
        let registry = SpecRegistry::new();
        let err = registry
            .create("k8s", "deploy", EntityType::Task, &data())
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownSpecKind { .. }));
    }

    #[test]
    fn created_spec_keeps_extras() {
        let registry = SpecRegistry::new();
        registry.register("", "job", EntityType::Task, NamedSpec::default);

        let spec = registry.create_generic("job", EntityType::Task, &data()).unwrap();
        assert_eq!(spec.to_map().get("unclaimed"), Some(&json!(true)));
    }

    #[test]
    fn contains_checks_both_axes() {
        let registry = SpecRegistry::new();
        registry.register("", "job", EntityType::Task, NamedSpec::default);
        assert!(registry.contains("anything", "job", EntityType::Task));
        assert!(!registry.contains("anything", "job", EntityType::Run));
    }
}
