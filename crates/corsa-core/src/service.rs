// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The run service: the thin caller surface of the orchestration core.
//!
//! `create_run` persists the run in `CREATED` state and returns immediately;
//! producing the runnable and dispatching it happen on a spawned task, never
//! on the request path. Once a run is accepted, failures surface through its
//! state and status, not through the caller.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::events::{CoreEvent, DispatchIntent, EventBus, RunnableChanged};
use crate::lifecycle::{RunLifecycle, TransitionRequest};
use crate::model::{Run, RunLocator, RunStatus, Transition};
use crate::registry::{Backend, BackendRegistry};
use crate::repo::{FunctionStore, RunStore, TaskStore};
use crate::spec::SpecMap;
use crate::state::{LifecycleEvent, RunState};

/// Caller-facing view of a run.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    /// Run identifier.
    pub id: Uuid,
    /// Current lifecycle state.
    pub state: RunState,
    /// Free-form status.
    pub status: RunStatus,
    /// Ordered transition history.
    pub transitions: Vec<Transition>,
    /// Soft-delete marker.
    pub deleted: bool,
}

/// Entry point for creating, inspecting, stopping, and deleting runs.
pub struct RunService {
    functions: Arc<dyn FunctionStore>,
    tasks: Arc<dyn TaskStore>,
    runs: Arc<dyn RunStore>,
    registry: Arc<BackendRegistry>,
    lifecycle: Arc<RunLifecycle>,
    bus: EventBus,
}

impl RunService {
    /// Create a service over its collaborator stores.
    pub fn new(
        functions: Arc<dyn FunctionStore>,
        tasks: Arc<dyn TaskStore>,
        runs: Arc<dyn RunStore>,
        registry: Arc<BackendRegistry>,
        lifecycle: Arc<RunLifecycle>,
        bus: EventBus,
    ) -> Self {
        Self {
            functions,
            tasks,
            runs,
            registry,
            lifecycle,
            bus,
        }
    }

    /// Create a run for a task, with caller overrides as a run spec template.
    ///
    /// Resolves the task's backend and spec types (unknown kinds and
    /// frameworks surface here, before the run is accepted), persists the run
    /// in `CREATED` state, and returns its id. Building and dispatching the
    /// runnable happen asynchronously.
    pub async fn create_run(&self, task_id: Uuid, overrides: SpecMap) -> Result<Uuid> {
        let task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "task",
                id: task_id.to_string(),
            })?;

        let function = self
            .functions
            .get_version(&task.project, &task.function, &task.function_version)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "function",
                id: format!("{}/{}:{}", task.project, task.function, task.function_version),
            })?;

        let backend = self.registry.get(&task.kind)?;
        let resolved = backend.build_spec(&function, &task, &overrides).await?;

        let run = Run::new(&task.project, RunLocator::for_task(&task), resolved);
        let run_id = run.id;
        self.runs.create(run.clone()).await?;

        info!(
            %run_id,
            project = %run.project,
            task = %run.task,
            "run created"
        );

        // Fire and forget: the caller gets the id, the pipeline gets the run.
        let _handle = self.spawn_launch(backend, run);

        Ok(run_id)
    }

    fn spawn_launch(&self, backend: Arc<dyn Backend>, run: Run) -> JoinHandle<()> {
        let lifecycle = self.lifecycle.clone();
        let bus = self.bus.clone();

        tokio::spawn(async move {
            let run_id = run.id;
            if let Err(e) = backend.produce(&run).await {
                error!(%run_id, error = %e, "failed to produce runnable");
                let request = TransitionRequest::new(run_id, LifecycleEvent::Error)
                    .with_message("failed to produce runnable".to_string())
                    .with_error(e.to_string());
                if let Err(apply_err) = lifecycle.apply(request).await {
                    error!(%run_id, error = %apply_err, "failed to record produce failure");
                }
                return;
            }

            let request = TransitionRequest::new(run_id, LifecycleEvent::Build);
            if let Err(e) = lifecycle.apply(request).await {
                error!(%run_id, error = %e, "failed to apply build transition");
                return;
            }

            bus.publish(CoreEvent::RunnableChanged(RunnableChanged {
                id: run_id,
                project: run.project.clone(),
                framework: run.framework().to_string(),
                previous_state: Some(RunState::Created),
                state: RunState::Built,
                intent: Some(DispatchIntent::Execute),
            }));
        })
    }

    /// Fetch a run's state, status, and transition history.
    pub async fn get_run(&self, id: Uuid) -> Result<RunSnapshot> {
        let run = self.runs.get(id).await?.ok_or_else(|| CoreError::NotFound {
            entity: "run",
            id: id.to_string(),
        })?;
        Ok(RunSnapshot {
            id: run.id,
            state: run.state,
            status: run.status,
            transitions: run.transitions,
            deleted: run.deleted,
        })
    }

    /// List runs of a project.
    pub async fn list_runs(&self, project: &str) -> Result<Vec<RunSnapshot>> {
        let runs = self.runs.list(project).await?;
        Ok(runs
            .into_iter()
            .map(|run| RunSnapshot {
                id: run.id,
                state: run.state,
                status: run.status,
                transitions: run.transitions,
                deleted: run.deleted,
            })
            .collect())
    }

    /// Request a best-effort stop of a run.
    ///
    /// Publishes a stop intent; the dispatch loop routes it to the backend.
    /// Stopping an already-terminal run is a no-op.
    pub async fn stop_run(&self, id: Uuid) -> Result<()> {
        let run = self.runs.get(id).await?.ok_or_else(|| CoreError::NotFound {
            entity: "run",
            id: id.to_string(),
        })?;

        self.bus.publish(CoreEvent::RunnableChanged(RunnableChanged {
            id: run.id,
            project: run.project.clone(),
            framework: run.framework().to_string(),
            previous_state: Some(run.state),
            state: run.state,
            intent: Some(DispatchIntent::Stop),
        }));
        Ok(())
    }

    /// Delete a run.
    ///
    /// A live run is first transitioned to `DELETED` (aborting its
    /// dispatch); a finished run keeps its final state and only the record
    /// is soft-marked or removed. `hard` removes the record and the stored
    /// runnable entirely.
    pub async fn delete_run(&self, id: Uuid, hard: bool) -> Result<()> {
        let run = self.runs.get(id).await?.ok_or_else(|| CoreError::NotFound {
            entity: "run",
            id: id.to_string(),
        })?;

        if !run.state.is_terminal() {
            self.lifecycle
                .apply(
                    TransitionRequest::new(id, LifecycleEvent::Delete)
                        .with_message("deleted on request".to_string()),
                )
                .await?;
        }

        if hard {
            if let Ok(backend) = self.registry.get(run.framework())
                && let Err(e) = backend.delete(id).await
            {
                error!(run_id = %id, error = %e, "failed to delete stored runnable");
            }
            self.runs.delete(id).await?;
            info!(run_id = %id, "run hard-deleted");
        } else {
            let mut run = self.runs.get(id).await?.ok_or_else(|| CoreError::NotFound {
                entity: "run",
                id: id.to_string(),
            })?;
            run.deleted = true;
            self.runs.update(run).await?;
            info!(run_id = %id, "run soft-deleted");
        }

        Ok(())
    }
}

impl std::fmt::Debug for RunService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunService")
            .field("backends", &self.registry.names())
            .finish()
    }
}
