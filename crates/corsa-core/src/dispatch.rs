// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The asynchronous dispatch loop.
//!
//! Consumes `runnable.changed` events that carry an intent, resolves the
//! backend by framework name, and performs exactly one of execute/stop per
//! event. One bounded task is spawned per event; failures are converted into
//! an `ERROR` transition and never crash the loop. An unknown framework
//! fails closed: no backend method is called and the run ends in `ERROR`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::error::CoreError;
use crate::events::{CoreEvent, DispatchIntent, EventBus, RunnableChanged};
use crate::lifecycle::{RunLifecycle, TransitionRequest};
use crate::registry::{BackendRegistry, ExecuteOutcome};
use crate::state::LifecycleEvent;

/// Tuning for the dispatch loop.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum dispatch tasks in flight at once.
    pub max_concurrency: usize,
    /// Retries of a transient execute failure before giving up.
    pub max_retries: u32,
    /// Base delay of the exponential retry backoff.
    pub backoff_base: Duration,
    /// Bound on every backend call.
    pub call_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            max_retries: 3,
            backoff_base: Duration::from_millis(250),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Worker loop that turns intent-carrying events into backend actions.
pub struct Dispatcher {
    registry: Arc<BackendRegistry>,
    lifecycle: Arc<RunLifecycle>,
    bus: EventBus,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Create a dispatcher.
    pub fn new(
        registry: Arc<BackendRegistry>,
        lifecycle: Arc<RunLifecycle>,
        bus: EventBus,
        config: DispatchConfig,
    ) -> Self {
        Self {
            registry,
            lifecycle,
            bus,
            config,
        }
    }

    /// Run the dispatch loop until the shutdown signal flips.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut events = self.bus.subscribe();
        let limiter = Arc::new(Semaphore::new(self.config.max_concurrency));

        info!(
            max_concurrency = self.config.max_concurrency,
            max_retries = self.config.max_retries,
            "Dispatch loop started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Dispatch loop received shutdown signal");
                        break;
                    }
                }

                event = events.recv() => match event {
                    Ok(CoreEvent::RunnableChanged(change)) if change.intent.is_some() => {
                        let permit = match limiter.clone().acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => break,
                        };
                        let dispatcher = self.clone();
                        tokio::spawn(async move {
                            dispatcher.handle(change).await;
                            drop(permit);
                        });
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "dispatch loop lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        info!("Dispatch loop stopped");
    }

    /// Handle one event. Errors are logged, never propagated.
    pub async fn handle(&self, change: RunnableChanged) {
        let intent = match change.intent {
            Some(intent) => intent,
            None => return,
        };

        let result = match intent {
            DispatchIntent::Execute => self.execute(&change).await,
            DispatchIntent::Stop => self.stop(&change).await,
        };

        if let Err(e) = result {
            error!(
                runnable_id = %change.id,
                framework = %change.framework,
                error = %e,
                "dispatch task failed"
            );
        }
    }

    async fn execute(&self, change: &RunnableChanged) -> crate::error::Result<()> {
        let backend = match self.registry.get(&change.framework) {
            Ok(backend) => backend,
            Err(CoreError::UnknownFramework { framework }) => {
                warn!(
                    runnable_id = %change.id,
                    %framework,
                    "unknown framework, failing run without backend call"
                );
                self.apply_tolerant(
                    TransitionRequest::new(change.id, LifecycleEvent::Error)
                        .with_message(format!("no framework registered under '{framework}'"))
                        .with_error(format!("unknown framework '{framework}'")),
                )
                .await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let mut attempt: u32 = 0;
        loop {
            match backend.execute(change.id, self.config.call_timeout).await {
                Ok(ExecuteOutcome::Submitted) => {
                    debug!(runnable_id = %change.id, "runnable submitted");
                    self.apply_tolerant(
                        TransitionRequest::new(change.id, LifecycleEvent::Pending)
                            .with_message(format!("submitted to '{}'", change.framework)),
                    )
                    .await;
                    return Ok(());
                }
                Ok(ExecuteOutcome::Skipped { state }) => {
                    debug!(runnable_id = %change.id, %state, "execute skipped");
                    return Ok(());
                }
                Err(CoreError::Framework(e))
                    if e.is_transient() && attempt < self.config.max_retries =>
                {
                    attempt += 1;
                    let delay = self.config.backoff_base * 2u32.pow(attempt - 1);
                    warn!(
                        runnable_id = %change.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient execute failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    let message = if attempt > 0 {
                        format!("dispatch failed after {attempt} retries: {e}")
                    } else {
                        format!("dispatch failed: {e}")
                    };
                    warn!(runnable_id = %change.id, error = %e, "dispatch giving up");

                    if let Err(store_err) = backend.fail(change.id, &message).await {
                        error!(
                            runnable_id = %change.id,
                            error = %store_err,
                            "failed to record runnable failure"
                        );
                    }
                    self.apply_tolerant(
                        TransitionRequest::new(change.id, LifecycleEvent::Error)
                            .with_message(message)
                            .with_error(e.to_string()),
                    )
                    .await;
                    return Ok(());
                }
            }
        }
    }

    async fn stop(&self, change: &RunnableChanged) -> crate::error::Result<()> {
        let backend = match self.registry.get(&change.framework) {
            Ok(backend) => backend,
            Err(CoreError::UnknownFramework { framework }) => {
                warn!(runnable_id = %change.id, %framework, "stop for unknown framework ignored");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match backend.stop(change.id, self.config.call_timeout).await {
            Ok(true) => {
                self.apply_tolerant(
                    TransitionRequest::new(change.id, LifecycleEvent::Stop)
                        .with_message("stopped on request".to_string()),
                )
                .await;
                if let Err(e) = backend
                    .record_state(change.id, crate::state::RunState::Stopped, None)
                    .await
                {
                    error!(runnable_id = %change.id, error = %e, "failed to persist stop");
                }
            }
            Ok(false) => {
                debug!(runnable_id = %change.id, "stop was a no-op");
            }
            Err(e) => {
                // Stop is best-effort: a failed stop call leaves the run to
                // the monitor rather than forcing a state.
                warn!(runnable_id = %change.id, error = %e, "stop call failed");
            }
        }
        Ok(())
    }

    /// Apply a transition, tolerating the benign outcomes of racing writers.
    async fn apply_tolerant(&self, request: TransitionRequest) {
        match self.lifecycle.apply(request).await {
            Ok(_) => {}
            Err(CoreError::IllegalTransition {
                run_id,
                state,
                event,
            }) => {
                debug!(%run_id, %state, %event, "transition superseded, not applied");
            }
            Err(e) => {
                error!(error = %e, "failed to apply transition");
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .finish()
    }
}
