// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Backend registry: maps framework names to registered backend bundles.
//!
//! A backend bundle couples one Framework with the Runner, Builder, and
//! runnable store for its concrete runnable type. The bundle is erased
//! behind the [`Backend`] trait so the run service, dispatch loop, and
//! monitor stay generic over the open set of backends; inside the adapter
//! everything is statically typed.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::builder::Builder;
use crate::error::{CoreError, Result};
use crate::framework::{Framework, FrameworkError};
use crate::model::{Function, Run, Task};
use crate::runnable::Runnable;
use crate::runner::Runner;
use crate::spec::registry::EntityType;
use crate::spec::{ConfigurableSpec, SpecMap, SpecRegistry};
use crate::state::RunState;
use crate::store::{RunnableFilter, RunnableStore};

/// Outcome of an erased execute call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// The runnable was submitted to the backend.
    Submitted,
    /// Nothing was submitted; the runnable is already past dispatch.
    Skipped {
        /// State that caused the skip.
        state: RunState,
    },
}

/// An observed backend state that differs from the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// State recorded in the store before the probe.
    pub previous: RunState,
    /// State the backend reported.
    pub observed: RunState,
    /// Owning project, for the republished notification.
    pub project: String,
}

/// Type-erased backend bundle.
///
/// Every operation is keyed by runnable id; the adapter loads from its own
/// store, so callers never handle concrete runnable types.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Framework name this backend serves; doubles as the task kind.
    fn name(&self) -> &str;

    /// Runtime axis of this backend's spec registrations (e.g. "k8s").
    fn runtime(&self) -> &str;

    /// Resolve a run spec from the entities and caller overrides.
    async fn build_spec(
        &self,
        function: &Function,
        task: &Task,
        overrides: &SpecMap,
    ) -> Result<SpecMap>;

    /// Produce the runnable for a run and persist it in `BUILT` state.
    async fn produce(&self, run: &Run) -> Result<()>;

    /// Submit a stored runnable to the backend.
    ///
    /// The `PENDING` mark is persisted before the backend call so a crash
    /// mid-dispatch is replayed as a status poll, never as a second
    /// submission. Runnables already past dispatch are skipped.
    async fn execute(&self, id: Uuid, timeout: Duration) -> Result<ExecuteOutcome>;

    /// Stop a stored runnable, best-effort.
    ///
    /// Returns `false` when the runnable is already terminal (no-op).
    async fn stop(&self, id: Uuid, timeout: Duration) -> Result<bool>;

    /// Probe the backend's view of a runnable.
    ///
    /// Edge-triggered: returns `Some` only when the observed state differs
    /// from the stored one. Does not persist anything.
    async fn poll(&self, id: Uuid, timeout: Duration) -> Result<Option<StatusChange>>;

    /// Persist an accepted state change onto the stored runnable.
    async fn record_state(&self, id: Uuid, state: RunState, error: Option<String>) -> Result<()>;

    /// Mark a stored runnable failed with a diagnostic message.
    async fn fail(&self, id: Uuid, message: &str) -> Result<()>;

    /// Ids of stored runnables not yet in a terminal state.
    async fn active(&self) -> Result<Vec<Uuid>>;

    /// Remove the stored runnable.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Bound a backend call by the configured timeout.
async fn bounded<T, F>(timeout: Duration, fut: F) -> std::result::Result<T, FrameworkError>
where
    F: std::future::Future<Output = std::result::Result<T, FrameworkError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(FrameworkError::Timeout),
    }
}

/// Typed backend bundle behind the [`Backend`] erasure.
struct BackendHandle<B, N, F>
where
    B: Builder,
    N: Runner,
    F: Framework<Runnable = N::Output>,
{
    runtime: String,
    specs: Arc<SpecRegistry>,
    builder: B,
    runner: N,
    framework: F,
    store: Arc<dyn RunnableStore<N::Output>>,
}

impl<B, N, F> BackendHandle<B, N, F>
where
    B: Builder,
    N: Runner,
    F: Framework<Runnable = N::Output>,
{
    async fn load(&self, id: Uuid) -> Result<N::Output> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "runnable",
                id: id.to_string(),
            })
    }

    fn typed_spec<S: ConfigurableDefault>(
        &self,
        kind: &str,
        entity: EntityType,
        data: &SpecMap,
    ) -> Result<S> {
        let spec = self.specs.create(&self.runtime, kind, entity, data)?;
        spec.as_any()
            .downcast_ref::<S>()
            .cloned()
            .ok_or_else(|| CoreError::Validation {
                field: entity.as_str().to_string(),
                message: format!(
                    "registered spec for kind '{kind}' is not the type this backend expects"
                ),
            })
    }
}

/// Helper bound: a spec type the registry can hand back for downcasting.
trait ConfigurableDefault: crate::spec::ConfigurableSpec + Default + Clone + 'static {}
impl<T> ConfigurableDefault for T where T: crate::spec::ConfigurableSpec + Default + Clone + 'static {}

#[async_trait]
impl<B, N, F> Backend for BackendHandle<B, N, F>
where
    B: Builder,
    B::Function: Clone + 'static,
    B::Task: Clone + 'static,
    B::Run: Clone + 'static,
    N: Runner,
    F: Framework<Runnable = N::Output>,
{
    fn name(&self) -> &str {
        self.framework.name()
    }

    fn runtime(&self) -> &str {
        &self.runtime
    }

    async fn build_spec(
        &self,
        function: &Function,
        task: &Task,
        overrides: &SpecMap,
    ) -> Result<SpecMap> {
        let function_spec: B::Function =
            self.typed_spec(&function.kind, EntityType::Function, &function.spec)?;
        let task_spec: B::Task = self.typed_spec(&task.kind, EntityType::Task, &task.spec)?;
        let template: B::Run = self.typed_spec(&task.kind, EntityType::Run, overrides)?;

        let resolved = self.builder.build(&function_spec, &task_spec, &template)?;
        Ok(resolved.to_map())
    }

    async fn produce(&self, run: &Run) -> Result<()> {
        let mut runnable = self.runner.produce(run)?;
        if runnable.id() != run.id || runnable.project() != run.project {
            return Err(CoreError::Validation {
                field: "runnable".to_string(),
                message: format!(
                    "runner for '{}' broke identity propagation (run {}, runnable {})",
                    self.name(),
                    run.id,
                    runnable.id()
                ),
            });
        }

        runnable.set_state(RunState::Built);
        self.store.store(&runnable).await?;
        Ok(())
    }

    async fn execute(&self, id: Uuid, timeout: Duration) -> Result<ExecuteOutcome> {
        let mut runnable = self.load(id).await?;

        match runnable.state() {
            RunState::Created | RunState::Built | RunState::Ready | RunState::Pending => {}
            state => {
                debug!(runnable_id = %id, %state, "execute skipped, already dispatched");
                return Ok(ExecuteOutcome::Skipped { state });
            }
        }

        // Persist the dispatch mark first: a crash from here on is replayed
        // as a status poll, never as a second submission.
        runnable.set_state(RunState::Pending);
        self.store.store(&runnable).await?;

        bounded(timeout, self.framework.execute(&mut runnable)).await?;

        self.store.store(&runnable).await?;
        Ok(ExecuteOutcome::Submitted)
    }

    async fn stop(&self, id: Uuid, timeout: Duration) -> Result<bool> {
        let mut runnable = self.load(id).await?;

        if runnable.state().is_terminal() {
            debug!(runnable_id = %id, state = %runnable.state(), "stop is a no-op on terminal runnable");
            return Ok(false);
        }

        bounded(timeout, self.framework.stop(&mut runnable)).await?;

        self.store.store(&runnable).await?;
        Ok(true)
    }

    async fn poll(&self, id: Uuid, timeout: Duration) -> Result<Option<StatusChange>> {
        let runnable = self.load(id).await?;
        let previous = runnable.state();

        if previous.is_terminal() {
            return Ok(None);
        }

        let observed = bounded(timeout, self.framework.status(&runnable)).await?;
        if observed == previous {
            return Ok(None);
        }

        Ok(Some(StatusChange {
            previous,
            observed,
            project: runnable.project().to_string(),
        }))
    }

    async fn record_state(&self, id: Uuid, state: RunState, error: Option<String>) -> Result<()> {
        let mut runnable = self.load(id).await?;
        runnable.set_state(state);
        if error.is_some() {
            runnable.set_error(error);
        }
        self.store.store(&runnable).await?;
        Ok(())
    }

    async fn fail(&self, id: Uuid, message: &str) -> Result<()> {
        let mut runnable = self.load(id).await?;
        runnable.set_state(RunState::Error);
        runnable.set_error(Some(message.to_string()));
        self.store.store(&runnable).await?;
        Ok(())
    }

    async fn active(&self) -> Result<Vec<Uuid>> {
        let runnables = self.store.find_all(&RunnableFilter::active()).await?;
        Ok(runnables.iter().map(|r| r.id()).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.store.delete(id).await?;
        Ok(())
    }
}

/// Registry of backend bundles, keyed by framework name.
#[derive(Default)]
pub struct BackendRegistry {
    backends: RwLock<HashMap<String, Arc<dyn Backend>>>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend bundle under its framework's name.
    ///
    /// The spec registry is shared so the bundle can resolve typed specs for
    /// its entities; spec factories themselves are registered by the backend
    /// integration before this call.
    pub fn register<B, N, F>(
        &self,
        runtime: &str,
        specs: Arc<SpecRegistry>,
        builder: B,
        runner: N,
        framework: F,
        store: Arc<dyn RunnableStore<N::Output>>,
    ) where
        B: Builder,
        B::Function: Clone + 'static,
        B::Task: Clone + 'static,
        B::Run: Clone + 'static,
        N: Runner,
        F: Framework<Runnable = N::Output>,
    {
        let handle = BackendHandle {
            runtime: runtime.to_string(),
            specs,
            builder,
            runner,
            framework,
            store,
        };
        let name = handle.name().to_string();
        self.backends
            .write()
            .expect("backend registry lock poisoned")
            .insert(name, Arc::new(handle));
    }

    /// Resolve a backend by framework name.
    pub fn get(&self, framework: &str) -> Result<Arc<dyn Backend>> {
        self.backends
            .read()
            .expect("backend registry lock poisoned")
            .get(framework)
            .cloned()
            .ok_or_else(|| CoreError::UnknownFramework {
                framework: framework.to_string(),
            })
    }

    /// Every registered backend.
    pub fn all(&self) -> Vec<Arc<dyn Backend>> {
        self.backends
            .read()
            .expect("backend registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Names of every registered backend.
    pub fn names(&self) -> Vec<String> {
        self.backends
            .read()
            .expect("backend registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}
