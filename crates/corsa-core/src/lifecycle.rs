// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Single-writer application of lifecycle transitions.
//!
//! All run mutations funnel through [`RunLifecycle::apply`]: a per-run async
//! lock serializes writers, the transition table rejects illegal changes,
//! and the event-id dedup makes every physical event apply exactly once even
//! when the bus delivers it twice. Accepted transitions are appended to the
//! run's immutable log with strictly increasing timestamps and re-published
//! as `run.changed`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::events::{CoreEvent, EventBus, RunChanged};
use crate::model::Transition;
use crate::repo::RunStore;
use crate::state::{LifecycleEvent, RunState, next_state};

/// One requested state change for a run.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    /// Run to transition.
    pub run_id: Uuid,
    /// Event to apply.
    pub event: LifecycleEvent,
    /// Identity of the physical event; replays with the same id are no-ops.
    pub event_id: Uuid,
    /// Optional message recorded on the transition and the run status.
    pub message: Option<String>,
    /// Optional failure diagnostic recorded on the run status.
    pub error: Option<String>,
}

impl TransitionRequest {
    /// Request with a fresh event id and no messages.
    pub fn new(run_id: Uuid, event: LifecycleEvent) -> Self {
        Self {
            run_id,
            event,
            event_id: Uuid::new_v4(),
            message: None,
            error: None,
        }
    }

    /// Attach a message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach a failure diagnostic.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Result of an accepted (or deduplicated) transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The transition was applied; the run is now in this state.
    Transitioned(RunState),
    /// The event id was already in the log; nothing changed.
    Duplicate(RunState),
}

impl Applied {
    /// The run's state after the call.
    pub fn state(&self) -> RunState {
        match self {
            Applied::Transitioned(s) | Applied::Duplicate(s) => *s,
        }
    }
}

/// The run state machine with its per-run single-writer path.
pub struct RunLifecycle {
    runs: Arc<dyn RunStore>,
    bus: EventBus,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl RunLifecycle {
    /// Create a lifecycle over the given run store and bus.
    pub fn new(runs: Arc<dyn RunStore>, bus: EventBus) -> Self {
        Self {
            runs,
            bus,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, run_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(run_id).or_default().clone()
    }

    /// Current state of a run.
    pub async fn state_of(&self, run_id: Uuid) -> Result<RunState> {
        let run = self
            .runs
            .get(run_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "run",
                id: run_id.to_string(),
            })?;
        Ok(run.state)
    }

    /// Apply one transition request.
    ///
    /// Returns [`Applied::Duplicate`] when the event id was already applied,
    /// and [`CoreError::IllegalTransition`] when the event is not legal from
    /// the run's current state; in both cases the run is unchanged.
    pub async fn apply(&self, request: TransitionRequest) -> Result<Applied> {
        let lock = self.lock_for(request.run_id).await;
        let _guard = lock.lock().await;

        let mut run = self
            .runs
            .get(request.run_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "run",
                id: request.run_id.to_string(),
            })?;

        if run
            .transitions
            .iter()
            .any(|t| t.event_id == request.event_id)
        {
            debug!(
                run_id = %request.run_id,
                event = %request.event,
                event_id = %request.event_id,
                "duplicate event ignored"
            );
            return Ok(Applied::Duplicate(run.state));
        }

        let Some(next) = next_state(run.state, request.event) else {
            warn!(
                run_id = %request.run_id,
                state = %run.state,
                event = %request.event,
                "illegal transition rejected"
            );
            return Err(CoreError::IllegalTransition {
                run_id: request.run_id,
                state: run.state,
                event: request.event,
            });
        };

        // Timestamps in the log are strictly increasing even when the wall
        // clock ties between two quick transitions.
        let mut timestamp = Utc::now();
        if let Some(last) = run.transitions.last()
            && timestamp <= last.timestamp
        {
            timestamp = last.timestamp + ChronoDuration::milliseconds(1);
        }

        run.transitions.push(Transition {
            event: request.event,
            state: next,
            message: request.message.clone(),
            event_id: request.event_id,
            timestamp,
        });

        let previous = run.state;
        run.state = next;
        run.updated = timestamp;
        if let Some(message) = request.message {
            run.status.message = Some(message);
        }
        if let Some(error) = request.error {
            run.status.error = Some(error);
        }

        self.runs.update(run).await?;

        info!(
            run_id = %request.run_id,
            event = %request.event,
            from = %previous,
            to = %next,
            "transition applied"
        );

        self.bus.publish(CoreEvent::RunChanged(RunChanged {
            run_id: request.run_id,
            state: next,
        }));

        Ok(Applied::Transitioned(next))
    }
}

impl std::fmt::Debug for RunLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLifecycle").finish()
    }
}
