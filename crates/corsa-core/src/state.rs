// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run lifecycle states and the transition table.
//!
//! ```text
//!                  ┌─────────┐
//!                  │ CREATED │
//!                  └────┬────┘
//!                       │ build
//!                       ▼
//!            ┌───────────────────┐
//!            │   BUILT / READY   │
//!            └─────────┬─────────┘
//!                      │ dispatch
//!                      ▼
//!            ┌───────────────────┐
//!            │  PENDING / IDLE   │   (backends with admission delay)
//!            └─────────┬─────────┘
//!                      │ admit
//!                      ▼
//!                 ┌─────────┐
//!      ┌──────────│ RUNNING │──────────┐
//!      │          └────┬────┘          │
//!  complete          fail            stop
//!      │               │               │
//!      ▼               ▼               ▼
//! ┌───────────┐    ┌───────┐    ┌─────────┐
//! │ COMPLETED │    │ ERROR │    │ STOPPED │
//! └───────────┘    └───────┘    └─────────┘
//! ```
//!
//! `DELETED` is reached by a delete event from any live state. Terminal
//! states accept no further events; disposal of a finished run is handled by
//! the entity store, not the transition table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of a run (and of the runnable derived from it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    /// Run accepted and persisted; nothing dispatched yet.
    Created,
    /// Runnable produced and stored, ready for dispatch.
    Built,
    /// Prepared by the backend but not yet submitted (e.g. image pulled).
    Ready,
    /// Submitted to the backend, waiting for admission.
    Pending,
    /// Admitted but intentionally parked by the backend scheduler.
    Idle,
    /// Actively executing on the backend.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with a failure.
    Error,
    /// Stopped on request before completion.
    Stopped,
    /// Deleted before reaching another terminal state.
    Deleted,
}

impl RunState {
    /// Whether this state accepts no further lifecycle events.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Error | RunState::Stopped | RunState::Deleted
        )
    }

    /// Canonical uppercase name, as stored and logged.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Created => "CREATED",
            RunState::Built => "BUILT",
            RunState::Ready => "READY",
            RunState::Pending => "PENDING",
            RunState::Idle => "IDLE",
            RunState::Running => "RUNNING",
            RunState::Completed => "COMPLETED",
            RunState::Error => "ERROR",
            RunState::Stopped => "STOPPED",
            RunState::Deleted => "DELETED",
        }
    }

    /// Parse a canonical state name.
    pub fn parse(s: &str) -> Option<RunState> {
        match s {
            "CREATED" => Some(RunState::Created),
            "BUILT" => Some(RunState::Built),
            "READY" => Some(RunState::Ready),
            "PENDING" => Some(RunState::Pending),
            "IDLE" => Some(RunState::Idle),
            "RUNNING" => Some(RunState::Running),
            "COMPLETED" => Some(RunState::Completed),
            "ERROR" => Some(RunState::Error),
            "STOPPED" => Some(RunState::Stopped),
            "DELETED" => Some(RunState::Deleted),
            _ => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event applied to a run by the dispatcher, the monitor, or a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LifecycleEvent {
    /// The runnable was produced and stored.
    Build,
    /// The backend reported the runnable as prepared.
    Ready,
    /// The runnable was submitted to the backend.
    Pending,
    /// The backend reported active execution.
    Run,
    /// The backend parked the runnable.
    Idle,
    /// The backend reported successful completion.
    Complete,
    /// The backend reported a failure, or dispatch gave up.
    Error,
    /// Execution was stopped on request.
    Stop,
    /// The run was deleted before finishing.
    Delete,
}

impl LifecycleEvent {
    /// Canonical uppercase name, as stored and logged.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Build => "BUILD",
            LifecycleEvent::Ready => "READY",
            LifecycleEvent::Pending => "PENDING",
            LifecycleEvent::Run => "RUN",
            LifecycleEvent::Idle => "IDLE",
            LifecycleEvent::Complete => "COMPLETE",
            LifecycleEvent::Error => "ERROR",
            LifecycleEvent::Stop => "STOP",
            LifecycleEvent::Delete => "DELETE",
        }
    }

    /// The lifecycle event that moves a run toward the given observed
    /// backend state, used by the monitor to turn a status probe into a
    /// transition.
    pub fn toward(state: RunState) -> Option<LifecycleEvent> {
        match state {
            RunState::Created => None,
            RunState::Built => Some(LifecycleEvent::Build),
            RunState::Ready => Some(LifecycleEvent::Ready),
            RunState::Pending => Some(LifecycleEvent::Pending),
            RunState::Idle => Some(LifecycleEvent::Idle),
            RunState::Running => Some(LifecycleEvent::Run),
            RunState::Completed => Some(LifecycleEvent::Complete),
            RunState::Error => Some(LifecycleEvent::Error),
            RunState::Stopped => Some(LifecycleEvent::Stop),
            RunState::Deleted => Some(LifecycleEvent::Delete),
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve `(current, event)` to the next state.
///
/// Returns `None` for every illegal combination, including any event applied
/// to a terminal state. Callers decide whether `None` is an error
/// (`IllegalTransition`) or a benign duplicate.
pub fn next_state(current: RunState, event: LifecycleEvent) -> Option<RunState> {
    use LifecycleEvent as E;
    use RunState as S;

    if current.is_terminal() {
        return None;
    }

    match (current, event) {
        (S::Created, E::Build) => Some(S::Built),
        (S::Created, E::Ready) => Some(S::Ready),
        (S::Created, E::Pending) => Some(S::Pending),
        (S::Created, E::Run) => Some(S::Running),

        (S::Built, E::Ready) => Some(S::Ready),
        (S::Built, E::Pending) => Some(S::Pending),
        (S::Built, E::Run) => Some(S::Running),

        (S::Ready, E::Pending) => Some(S::Pending),
        (S::Ready, E::Idle) => Some(S::Idle),
        (S::Ready, E::Run) => Some(S::Running),

        (S::Pending, E::Idle) => Some(S::Idle),
        (S::Pending, E::Run) => Some(S::Running),
        (S::Pending, E::Complete) => Some(S::Completed),

        (S::Idle, E::Pending) => Some(S::Pending),
        (S::Idle, E::Run) => Some(S::Running),
        (S::Idle, E::Complete) => Some(S::Completed),

        (S::Running, E::Idle) => Some(S::Idle),
        (S::Running, E::Complete) => Some(S::Completed),

        // Failure and cancellation are reachable from every live state.
        (_, E::Error) => Some(S::Error),
        (_, E::Stop) => Some(S::Stopped),
        (_, E::Delete) => Some(S::Deleted),

        _ => None,
    }
}
