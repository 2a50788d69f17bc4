// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Core entities: functions, tasks, runs, and their wire records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::spec::SpecMap;
use crate::state::{LifecycleEvent, RunState};

/// Immutable template describing what to run.
///
/// Versions are never mutated, only superseded by a new version under the
/// same name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    /// Unique identifier of this version.
    pub id: Uuid,
    /// Owning project.
    pub project: String,
    /// Name shared by all versions of the function.
    pub name: String,
    /// Spec discriminator, doubling as the runtime axis (e.g. "k8s").
    pub kind: String,
    /// Version label of this record.
    pub version: String,
    /// Open spec payload.
    pub spec: SpecMap,
    /// When this version was created.
    pub created: DateTime<Utc>,
}

/// Binds a function to one backend execution profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning project.
    pub project: String,
    /// Backend profile discriminator; equals the framework name it targets
    /// (e.g. "k8s-job", "local").
    pub kind: String,
    /// Name of the target function within the same project.
    pub function: String,
    /// Version of the target function.
    pub function_version: String,
    /// Open backend-specific spec payload.
    pub spec: SpecMap,
    /// When the task was created.
    pub created: DateTime<Utc>,
}

/// Resolved task locator of the shape
/// `{kind}+{action}://{project}/{function}:{version}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLocator {
    /// Task kind (backend profile / framework name).
    pub kind: String,
    /// Requested action, e.g. "run".
    pub action: String,
    /// Owning project.
    pub project: String,
    /// Target function name.
    pub function: String,
    /// Target function version.
    pub version: String,
}

impl RunLocator {
    /// Build the locator for running `task` against its target function.
    pub fn for_task(task: &Task) -> Self {
        Self {
            kind: task.kind.clone(),
            action: "run".to_string(),
            project: task.project.clone(),
            function: task.function.clone(),
            version: task.function_version.clone(),
        }
    }

    /// Parse a locator string.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |message: &str| CoreError::Validation {
            field: "task".to_string(),
            message: format!("{message}: '{s}'"),
        };

        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| invalid("missing '://'"))?;
        let (kind, action) = scheme
            .split_once('+')
            .ok_or_else(|| invalid("missing '+' in scheme"))?;
        let (project, target) = rest
            .split_once('/')
            .ok_or_else(|| invalid("missing project separator"))?;
        let (function, version) = target
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing version separator"))?;

        if kind.is_empty()
            || action.is_empty()
            || project.is_empty()
            || function.is_empty()
            || version.is_empty()
        {
            return Err(invalid("empty component"));
        }

        Ok(Self {
            kind: kind.to_string(),
            action: action.to_string(),
            project: project.to_string(),
            function: function.to_string(),
            version: version.to_string(),
        })
    }
}

impl std::fmt::Display for RunLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}+{}://{}/{}:{}",
            self.kind, self.action, self.project, self.function, self.version
        )
    }
}

/// Free-form result of a run, updated by the state machine only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    /// Human-readable progress or result message.
    pub message: Option<String>,
    /// Diagnostic message of the most recent failure, if any.
    pub error: Option<String>,
    /// Backend-specific detail (log pointers, object names).
    #[serde(default)]
    pub detail: SpecMap,
}

/// One accepted state change, appended to a run's transition log.
///
/// Records are never mutated or deleted; the `event_id` deduplicates
/// replayed physical events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Lifecycle event that caused the change.
    pub event: LifecycleEvent,
    /// State the run entered.
    pub state: RunState,
    /// Optional message attached to the change.
    pub message: Option<String>,
    /// Identity of the physical event, for idempotence.
    pub event_id: Uuid,
    /// When the transition was applied; strictly increasing per run.
    pub timestamp: DateTime<Utc>,
}

/// One execution instance of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique identifier, shared with the runnable derived from it.
    pub id: Uuid,
    /// Owning project.
    pub project: String,
    /// Resolved task locator.
    pub task: RunLocator,
    /// Fully-resolved spec (function + task + caller overrides).
    pub spec: SpecMap,
    /// Current lifecycle state.
    pub state: RunState,
    /// Free-form status, mutated only by the state machine.
    pub status: RunStatus,
    /// Append-only transition log.
    pub transitions: Vec<Transition>,
    /// Soft-delete marker set by the entity store.
    pub deleted: bool,
    /// When the run was created.
    pub created: DateTime<Utc>,
    /// When the run was last updated.
    pub updated: DateTime<Utc>,
}

impl Run {
    /// Create a new run in `CREATED` state.
    pub fn new(project: &str, task: RunLocator, spec: SpecMap) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project: project.to_string(),
            task,
            spec,
            state: RunState::Created,
            status: RunStatus::default(),
            transitions: Vec::new(),
            deleted: false,
            created: now,
            updated: now,
        }
    }

    /// The backend name responsible for this run.
    pub fn framework(&self) -> &str {
        &self.task.kind
    }
}

/// Entity-store wire shape of a run: spec and status travel as compact
/// binary payloads so the store stays schema-tolerant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier.
    pub id: Uuid,
    /// Owning project.
    pub project: String,
    /// Resolved task locator string.
    pub task_ref: String,
    /// MessagePack-encoded resolved spec.
    pub spec_bytes: Vec<u8>,
    /// MessagePack-encoded status and transition log.
    pub status_bytes: Vec<u8>,
    /// Current lifecycle state.
    pub state: RunState,
    /// Soft-delete marker.
    pub deleted: bool,
    /// When the run was created.
    pub created: DateTime<Utc>,
    /// When the run was last updated.
    pub updated: DateTime<Utc>,
}

/// Status and transition log bundled into one stored payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatusPayload {
    status: RunStatus,
    transitions: Vec<Transition>,
}

impl RunRecord {
    /// Encode a run into its wire record.
    pub fn encode(run: &Run) -> Result<Self> {
        let payload = StatusPayload {
            status: run.status.clone(),
            transitions: run.transitions.clone(),
        };
        Ok(Self {
            id: run.id,
            project: run.project.clone(),
            task_ref: run.task.to_string(),
            spec_bytes: rmp_serde::to_vec_named(&run.spec)?,
            status_bytes: rmp_serde::to_vec_named(&payload)?,
            state: run.state,
            deleted: run.deleted,
            created: run.created,
            updated: run.updated,
        })
    }

    /// Decode a wire record back into a run.
    pub fn decode(&self) -> Result<Run> {
        let spec: SpecMap = rmp_serde::from_slice(&self.spec_bytes)?;
        let payload: StatusPayload = rmp_serde::from_slice(&self.status_bytes)?;
        Ok(Run {
            id: self.id,
            project: self.project.clone(),
            task: RunLocator::parse(&self.task_ref)?,
            spec,
            state: self.state,
            status: payload.status,
            transitions: payload.transitions,
            deleted: self.deleted,
            created: self.created,
            updated: self.updated,
        })
    }
}
