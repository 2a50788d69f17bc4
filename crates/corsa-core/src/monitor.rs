// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background worker reconciling backend status into run state.
//!
//! Periodically probes every runnable not yet in a terminal state across all
//! registered backends. The check is edge-triggered: a transition is applied
//! and a `runnable.changed` notification republished only when the observed
//! backend state differs from the stored one. A failed or timed-out probe
//! leaves the run unchanged and is retried at the next cadence, so a backend
//! outage never flips running jobs to `ERROR`.
//!
//! The first sweep doubles as crash recovery: runnables found mid-flight
//! after a restart are probed, never re-executed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::events::{CoreEvent, EventBus, RunnableChanged};
use crate::lifecycle::{RunLifecycle, TransitionRequest};
use crate::registry::{Backend, BackendRegistry};
use crate::state::LifecycleEvent;

/// Configuration for the runnable monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// How often to probe active runnables.
    pub poll_interval: Duration,
    /// Bound on every status call.
    pub call_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            call_timeout: Duration::from_secs(10),
        }
    }
}

/// Background worker that polls backends and applies observed changes.
pub struct RunnableMonitor {
    registry: Arc<BackendRegistry>,
    lifecycle: Arc<RunLifecycle>,
    bus: EventBus,
    config: MonitorConfig,
    shutdown: Arc<Notify>,
}

impl RunnableMonitor {
    /// Create a monitor.
    pub fn new(
        registry: Arc<BackendRegistry>,
        lifecycle: Arc<RunLifecycle>,
        bus: EventBus,
        config: MonitorConfig,
    ) -> Self {
        Self {
            registry,
            lifecycle,
            bus,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the monitor loop.
    ///
    /// Sweeps once immediately (the recovery pass), then on every poll tick
    /// until the shutdown signal is received.
    pub async fn run(&self) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Runnable monitor started"
        );

        self.poll_once().await;

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Runnable monitor received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {
                    self.poll_once().await;
                }
            }
        }

        info!("Runnable monitor stopped");
    }

    /// Probe every active runnable of every backend once.
    pub async fn poll_once(&self) {
        for backend in self.registry.all() {
            let ids = match backend.active().await {
                Ok(ids) => ids,
                Err(e) => {
                    error!(
                        framework = backend.name(),
                        error = %e,
                        "failed to list active runnables"
                    );
                    continue;
                }
            };

            if !ids.is_empty() {
                debug!(framework = backend.name(), count = ids.len(), "probing runnables");
            }

            for id in ids {
                if let Err(e) = self.reconcile(backend.as_ref(), id).await {
                    match e {
                        // Probe failures leave the state unchanged; the next
                        // tick retries them indefinitely.
                        CoreError::Framework(fe) => {
                            debug!(
                                runnable_id = %id,
                                framework = backend.name(),
                                error = %fe,
                                "status probe failed, will retry"
                            );
                        }
                        other => {
                            error!(
                                runnable_id = %id,
                                framework = backend.name(),
                                error = %other,
                                "failed to reconcile runnable"
                            );
                        }
                    }
                }
            }
        }
    }

    async fn reconcile(&self, backend: &dyn Backend, id: Uuid) -> Result<()> {
        let Some(change) = backend.poll(id, self.config.call_timeout).await? else {
            return Ok(());
        };

        let Some(event) = LifecycleEvent::toward(change.observed) else {
            warn!(runnable_id = %id, observed = %change.observed, "unmapped backend state");
            return Ok(());
        };

        let request = TransitionRequest::new(id, event)
            .with_message(format!("backend reported {}", change.observed));

        match self.lifecycle.apply(request).await {
            Ok(_) => {
                backend.record_state(id, change.observed, None).await?;
                self.bus.publish(CoreEvent::RunnableChanged(RunnableChanged {
                    id,
                    project: change.project.clone(),
                    framework: backend.name().to_string(),
                    previous_state: Some(change.previous),
                    state: change.observed,
                    intent: None,
                }));
            }
            Err(CoreError::IllegalTransition { state, .. }) if state == change.observed => {
                // The run got there through another writer; catch the stored
                // runnable up without a second transition.
                backend.record_state(id, change.observed, None).await?;
            }
            Err(e) => return Err(e),
        }

        Ok(())
    }
}

impl std::fmt::Debug for RunnableMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnableMonitor")
            .field("config", &self.config)
            .finish()
    }
}
