// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for corsa-core.
//!
//! This module provides [`OrchestratorRuntime`] which wires the dispatch
//! loop and the runnable monitor into an existing tokio application.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use corsa_core::runtime::OrchestratorRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let specs = Arc::new(corsa_core::spec::SpecRegistry::new());
//!     let backends = Arc::new(corsa_core::registry::BackendRegistry::new());
//!     // ... register backend integrations ...
//!
//!     let runtime = OrchestratorRuntime::builder()
//!         .spec_registry(specs)
//!         .backend_registry(backends)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     let run_id = runtime.service().create_run(task_id, overrides).await?;
//!
//!     // ... run your application ...
//!
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::events::EventBus;
use crate::lifecycle::RunLifecycle;
use crate::monitor::RunnableMonitor;
use crate::registry::BackendRegistry;
use crate::repo::{
    FunctionStore, MemoryFunctionStore, MemoryRunStore, MemoryTaskStore, RunStore, TaskStore,
};
use crate::service::RunService;
use crate::spec::SpecRegistry;

/// Builder for creating an [`OrchestratorRuntime`].
pub struct OrchestratorRuntimeBuilder {
    spec_registry: Option<Arc<SpecRegistry>>,
    backend_registry: Option<Arc<BackendRegistry>>,
    functions: Option<Arc<dyn FunctionStore>>,
    tasks: Option<Arc<dyn TaskStore>>,
    runs: Option<Arc<dyn RunStore>>,
    bus: Option<EventBus>,
    config: Config,
}

impl std::fmt::Debug for OrchestratorRuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorRuntimeBuilder")
            .field("spec_registry", &self.spec_registry.as_ref().map(|_| "..."))
            .field(
                "backend_registry",
                &self.backend_registry.as_ref().map(|_| "..."),
            )
            .field("config", &self.config)
            .finish()
    }
}

impl Default for OrchestratorRuntimeBuilder {
    fn default() -> Self {
        Self {
            spec_registry: None,
            backend_registry: None,
            functions: None,
            tasks: None,
            runs: None,
            bus: None,
            config: Config::default(),
        }
    }
}

impl OrchestratorRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the spec registry (required).
    pub fn spec_registry(mut self, specs: Arc<SpecRegistry>) -> Self {
        self.spec_registry = Some(specs);
        self
    }

    /// Set the backend registry (required).
    pub fn backend_registry(mut self, backends: Arc<BackendRegistry>) -> Self {
        self.backend_registry = Some(backends);
        self
    }

    /// Set the function store. Defaults to an in-memory store.
    pub fn function_store(mut self, store: Arc<dyn FunctionStore>) -> Self {
        self.functions = Some(store);
        self
    }

    /// Set the task store. Defaults to an in-memory store.
    pub fn task_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.tasks = Some(store);
        self
    }

    /// Set the run store. Defaults to an in-memory store.
    pub fn run_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.runs = Some(store);
        self
    }

    /// Set the event bus. Defaults to a fresh bus.
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Set the configuration. Defaults to [`Config::default`].
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<OrchestratorRuntimeConfig> {
        let spec_registry = self
            .spec_registry
            .ok_or_else(|| anyhow::anyhow!("spec registry is required"))?;
        let backend_registry = self
            .backend_registry
            .ok_or_else(|| anyhow::anyhow!("backend registry is required"))?;

        Ok(OrchestratorRuntimeConfig {
            spec_registry,
            backend_registry,
            functions: self
                .functions
                .unwrap_or_else(|| Arc::new(MemoryFunctionStore::new())),
            tasks: self
                .tasks
                .unwrap_or_else(|| Arc::new(MemoryTaskStore::new())),
            runs: self.runs.unwrap_or_else(|| Arc::new(MemoryRunStore::new())),
            bus: self.bus.unwrap_or_default(),
            config: self.config,
        })
    }
}

/// Configuration for an [`OrchestratorRuntime`].
pub struct OrchestratorRuntimeConfig {
    spec_registry: Arc<SpecRegistry>,
    backend_registry: Arc<BackendRegistry>,
    functions: Arc<dyn FunctionStore>,
    tasks: Arc<dyn TaskStore>,
    runs: Arc<dyn RunStore>,
    bus: EventBus,
    config: Config,
}

impl fmt::Debug for OrchestratorRuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorRuntimeConfig").finish()
    }
}

impl OrchestratorRuntimeConfig {
    /// Start the runtime, spawning the dispatch loop and the monitor.
    ///
    /// The monitor's first sweep is the crash-recovery pass: runnables found
    /// in a non-terminal state are probed for status, never re-executed.
    pub async fn start(self) -> Result<OrchestratorRuntime> {
        let lifecycle = Arc::new(RunLifecycle::new(self.runs.clone(), self.bus.clone()));

        let service = Arc::new(RunService::new(
            self.functions,
            self.tasks,
            self.runs,
            self.backend_registry.clone(),
            lifecycle.clone(),
            self.bus.clone(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let dispatcher = Arc::new(Dispatcher::new(
            self.backend_registry.clone(),
            lifecycle.clone(),
            self.bus.clone(),
            self.config.dispatch(),
        ));
        let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown_rx));

        let monitor = Arc::new(RunnableMonitor::new(
            self.backend_registry.clone(),
            lifecycle.clone(),
            self.bus.clone(),
            self.config.monitor(),
        ));
        let monitor_shutdown = monitor.shutdown_handle();
        let monitor_task = monitor.clone();
        let monitor_handle = tokio::spawn(async move { monitor_task.run().await });

        info!(
            backends = ?self.backend_registry.names(),
            "OrchestratorRuntime started"
        );

        Ok(OrchestratorRuntime {
            service,
            spec_registry: self.spec_registry,
            backend_registry: self.backend_registry,
            bus: self.bus,
            shutdown_tx,
            monitor_shutdown,
            dispatcher_handle,
            monitor_handle,
        })
    }
}

/// A running orchestration core that can be embedded in an application.
///
/// The runtime manages:
/// - the dispatch loop consuming `runnable.changed` events
/// - the runnable monitor reconciling backend status
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct OrchestratorRuntime {
    service: Arc<RunService>,
    spec_registry: Arc<SpecRegistry>,
    backend_registry: Arc<BackendRegistry>,
    bus: EventBus,
    shutdown_tx: watch::Sender<bool>,
    monitor_shutdown: Arc<tokio::sync::Notify>,
    dispatcher_handle: JoinHandle<()>,
    monitor_handle: JoinHandle<()>,
}

impl OrchestratorRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> OrchestratorRuntimeBuilder {
        OrchestratorRuntimeBuilder::new()
    }

    /// The run service.
    pub fn service(&self) -> &Arc<RunService> {
        &self.service
    }

    /// The shared spec registry.
    pub fn spec_registry(&self) -> &Arc<SpecRegistry> {
        &self.spec_registry
    }

    /// The shared backend registry.
    pub fn backend_registry(&self) -> &Arc<BackendRegistry> {
        &self.backend_registry
    }

    /// The event bus, for subscribing to core events.
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Whether both workers are still running.
    pub fn is_running(&self) -> bool {
        !self.dispatcher_handle.is_finished() && !self.monitor_handle.is_finished()
    }

    /// Gracefully shut down the runtime.
    ///
    /// Signals both workers and waits for them to finish.
    pub async fn shutdown(self) -> Result<()> {
        info!("OrchestratorRuntime shutting down...");

        let _ = self.shutdown_tx.send(true);
        // notify_one stores a permit, so the monitor sees the signal even if
        // it is mid-sweep rather than parked on the Notify.
        self.monitor_shutdown.notify_one();

        self.dispatcher_handle
            .await
            .map_err(|e| anyhow::anyhow!("dispatch loop panicked: {e}"))?;
        self.monitor_handle
            .await
            .map_err(|e| anyhow::anyhow!("monitor panicked: {e}"))?;

        info!("OrchestratorRuntime shutdown complete");
        Ok(())
    }
}

impl std::fmt::Debug for OrchestratorRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorRuntime")
            .field("backends", &self.backend_registry.names())
            .finish()
    }
}
