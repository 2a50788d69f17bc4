// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Local process backend for corsa.
//!
//! Runs shell functions as supervised host processes, with no external
//! infrastructure. Useful for development, tests, and single-node
//! deployments; also the reference for what a minimal backend integration
//! looks like.
//!
//! ```rust,ignore
//! let store = Arc::new(MemoryRunnableStore::new());
//! corsa_local::register(&specs, &backends, store);
//! ```

#![deny(missing_docs)]

use std::sync::Arc;

use corsa_core::registry::BackendRegistry;
use corsa_core::spec::SpecRegistry;
use corsa_core::spec::registry::EntityType;
use corsa_core::store::RunnableStore;

/// Runtime axis of this integration's spec registrations.
pub const RUNTIME: &str = "shell";
/// Framework name (and task kind) of the local profile.
pub const FRAMEWORK_LOCAL: &str = "local";

/// Builder resolving run specs.
pub mod builder;

/// The "local" framework implementation.
pub mod framework;

/// Runner and runnable types.
pub mod runner;

/// Spec types for functions, tasks, and runs.
pub mod spec;

/// Register the local backend: spec factories plus the backend bundle.
pub fn register(
    specs: &Arc<SpecRegistry>,
    backends: &BackendRegistry,
    store: Arc<dyn RunnableStore<runner::LocalRunnable>>,
) {
    specs.register(
        RUNTIME,
        RUNTIME,
        EntityType::Function,
        spec::ShellFunctionSpec::default,
    );
    specs.register(
        RUNTIME,
        FRAMEWORK_LOCAL,
        EntityType::Task,
        spec::LocalTaskSpec::default,
    );
    specs.register(
        RUNTIME,
        FRAMEWORK_LOCAL,
        EntityType::Run,
        spec::LocalRunSpec::default,
    );

    backends.register(
        RUNTIME,
        specs.clone(),
        builder::LocalBuilder,
        runner::LocalRunner,
        framework::LocalFramework::new(),
        store,
    );
}
