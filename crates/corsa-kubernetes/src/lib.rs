// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kubernetes Jobs backend for corsa.
//!
//! Runs container functions as `batch/v1` Jobs. The integration registers:
//!
//! - spec factories under the `k8s` runtime: [`spec::ContainerFunctionSpec`]
//!   for functions, [`spec::K8sJobTaskSpec`] and [`spec::K8sJobRunSpec`] for
//!   the "k8s-job" task kind
//! - the backend bundle: [`builder::K8sJobBuilder`],
//!   [`runner::K8sJobRunner`], and [`framework::K8sJobFramework`] over a
//!   shared [`client::JobsApi`]
//!
//! Job object names derive from the run id, so a replayed submission
//! collides on the name and is treated as already submitted.
//!
//! ```rust,ignore
//! let client: Arc<dyn JobsApi> = Arc::new(FakeJobsApi::new());
//! let store = Arc::new(MemoryRunnableStore::new());
//! corsa_kubernetes::register(&specs, &backends, client, store, "corsa-jobs");
//! ```

#![deny(missing_docs)]

use std::sync::Arc;

use corsa_core::registry::BackendRegistry;
use corsa_core::spec::SpecRegistry;
use corsa_core::spec::registry::EntityType;
use corsa_core::store::RunnableStore;

/// Runtime axis of this integration's spec registrations.
pub const RUNTIME: &str = "k8s";
/// Framework name (and task kind) of the Jobs profile.
pub const FRAMEWORK_JOB: &str = "k8s-job";

/// Jobs API client abstraction and the in-memory fake.
pub mod client;

/// The "k8s-job" framework implementation.
pub mod framework;

/// Job manifest construction.
pub mod manifest;

/// Runner and runnable types.
pub mod runner;

/// Spec types for functions, tasks, and runs.
pub mod spec;

/// Builder resolving run specs.
pub mod builder;

/// Register the Jobs backend: spec factories plus the backend bundle.
pub fn register(
    specs: &Arc<SpecRegistry>,
    backends: &BackendRegistry,
    client: Arc<dyn client::JobsApi>,
    store: Arc<dyn RunnableStore<runner::K8sJobRunnable>>,
    namespace: &str,
) {
    specs.register(
        RUNTIME,
        RUNTIME,
        EntityType::Function,
        spec::ContainerFunctionSpec::default,
    );
    specs.register(
        RUNTIME,
        FRAMEWORK_JOB,
        EntityType::Task,
        spec::K8sJobTaskSpec::default,
    );
    specs.register(
        RUNTIME,
        FRAMEWORK_JOB,
        EntityType::Run,
        spec::K8sJobRunSpec::default,
    );

    backends.register(
        RUNTIME,
        specs.clone(),
        builder::K8sJobBuilder,
        runner::K8sJobRunner::new(namespace),
        framework::K8sJobFramework::new(client),
        store,
    );
}
