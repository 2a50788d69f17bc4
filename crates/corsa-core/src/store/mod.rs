// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Durable keyed storage for runnables.
//!
//! One store instance exists per concrete runnable type, which keeps
//! retention and compaction decisions per backend. The SQLite implementation
//! is the durable default; the in-memory one serves embedding and tests.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryRunnableStore;
pub use sqlite::SqliteRunnableStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::runnable::Runnable;
use crate::state::RunState;

/// Errors from store operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error during '{operation}': {details}")]
    Database {
        /// The operation that failed.
        operation: &'static str,
        /// Error details.
        details: String,
    },

    /// Payload encoding or decoding failed.
    #[error("payload encoding error: {0}")]
    Encoding(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database {
            operation: "query",
            details: err.to_string(),
        }
    }
}

/// Filter for [`RunnableStore::find_all`].
#[derive(Debug, Clone, Default)]
pub struct RunnableFilter {
    /// Restrict to these states; `None` means any state.
    pub states: Option<Vec<RunState>>,
    /// Restrict to one project.
    pub project: Option<String>,
}

impl RunnableFilter {
    /// Filter matching every runnable not yet in a terminal state.
    pub fn active() -> Self {
        Self {
            states: Some(vec![
                RunState::Created,
                RunState::Built,
                RunState::Ready,
                RunState::Pending,
                RunState::Idle,
                RunState::Running,
            ]),
            project: None,
        }
    }

    /// Whether a `(state, project)` pair passes this filter.
    pub fn matches(&self, state: RunState, project: &str) -> bool {
        if let Some(states) = &self.states
            && !states.contains(&state)
        {
            return false;
        }
        if let Some(p) = &self.project
            && p != project
        {
            return false;
        }
        true
    }
}

/// Durable keyed storage of runnable state.
///
/// `store` is an upsert; `get` of an unknown id is `Ok(None)`. Writes for a
/// given id are serialized by the callers (the lifecycle's per-run path);
/// reads are concurrent.
#[async_trait]
pub trait RunnableStore<R: Runnable>: Send + Sync {
    /// Fetch a runnable by id.
    async fn get(&self, id: Uuid) -> Result<Option<R>, StoreError>;

    /// Insert or replace a runnable.
    async fn store(&self, runnable: &R) -> Result<(), StoreError>;

    /// Remove a runnable. Removing an unknown id is not an error.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// List runnables matching the filter.
    async fn find_all(&self, filter: &RunnableFilter) -> Result<Vec<R>, StoreError>;
}
