// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed in-process event bus.
//!
//! The core publishes two topics: `runnable.changed` (consumed by the
//! dispatch loop when it carries an intent, re-published by the monitor as a
//! pure notification) and `run.changed` (downstream notification of every
//! accepted transition). Cross-process broker wiring is a collaborator
//! concern; this bus is the in-process seam it would plug into.

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::state::RunState;

/// Topic name of [`RunnableChanged`] events.
pub const TOPIC_RUNNABLE_CHANGED: &str = "runnable.changed";
/// Topic name of [`RunChanged`] events.
pub const TOPIC_RUN_CHANGED: &str = "run.changed";

/// Backend action requested by a `runnable.changed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchIntent {
    /// Submit the runnable to its backend.
    Execute,
    /// Stop the runnable on its backend, best-effort.
    Stop,
}

/// A runnable's state changed, or a backend action is requested.
#[derive(Debug, Clone)]
pub struct RunnableChanged {
    /// Runnable (and run) identifier.
    pub id: Uuid,
    /// Owning project.
    pub project: String,
    /// Backend name declared by the runnable.
    pub framework: String,
    /// State before the change, when known.
    pub previous_state: Option<RunState>,
    /// State after the change.
    pub state: RunState,
    /// Action the dispatch loop should take; `None` for pure notifications.
    pub intent: Option<DispatchIntent>,
}

/// A run's state changed.
#[derive(Debug, Clone)]
pub struct RunChanged {
    /// Run identifier.
    pub run_id: Uuid,
    /// State after the change.
    pub state: RunState,
}

/// Event envelope carried by the bus.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// `runnable.changed` payload.
    RunnableChanged(RunnableChanged),
    /// `run.changed` payload.
    RunChanged(RunChanged),
}

impl CoreEvent {
    /// Topic this event belongs to.
    pub fn topic(&self) -> &'static str {
        match self {
            CoreEvent::RunnableChanged(_) => TOPIC_RUNNABLE_CHANGED,
            CoreEvent::RunChanged(_) => TOPIC_RUN_CHANGED,
        }
    }
}

/// Broadcast bus connecting the service, dispatch loop, and monitor.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Create a bus with the given buffer capacity per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to every current subscriber.
    ///
    /// Publishing with no subscribers is not an error; the event is dropped.
    pub fn publish(&self, event: CoreEvent) {
        let topic = event.topic();
        match self.tx.send(event) {
            Ok(receivers) => debug!(topic, receivers, "event published"),
            Err(_) => debug!(topic, "event dropped, no subscribers"),
        }
    }

    /// Subscribe to all topics.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
