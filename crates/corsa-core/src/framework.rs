// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The framework contract: pluggable backend executors.

use async_trait::async_trait;
use thiserror::Error;

use crate::runnable::Runnable;
use crate::state::RunState;

/// Errors from backend calls.
///
/// The transient/fatal split drives the dispatch loop's retry policy:
/// transient failures are retried with backoff, fatal ones end the run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameworkError {
    /// The backend rejected the runnable; retrying cannot help.
    #[error("backend rejected the runnable: {0}")]
    Rejected(String),

    /// A transient failure (network, throttling, temporary outage).
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// The bounded backend call did not finish in time.
    #[error("backend call timed out")]
    Timeout,

    /// I/O failure while talking to the backend.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameworkError {
    /// Whether the dispatch loop should retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FrameworkError::Transient(_) | FrameworkError::Timeout | FrameworkError::Io(_)
        )
    }
}

/// A pluggable backend executor (Kubernetes Jobs, Argo Workflows, an image
/// builder, a local process pool).
///
/// Contract notes:
/// - `execute` submits the runnable; backend-specific idempotence is the
///   framework's job (an object-name collision means "already submitted",
///   not an error).
/// - `stop` is best-effort and must be a no-op on an already-terminal
///   runnable.
/// - `status` reports the backend's view; a failed probe must surface an
///   error rather than guessing a state.
///
/// All three calls mutate at most the runnable's state, error, and message
/// fields.
#[async_trait]
pub trait Framework: Send + Sync + 'static {
    /// Concrete runnable type this framework executes.
    type Runnable: Runnable;

    /// Backend name this framework serves, e.g. "k8s-job".
    fn name(&self) -> &'static str;

    /// Submit the runnable to the backend.
    async fn execute(&self, runnable: &mut Self::Runnable) -> Result<(), FrameworkError>;

    /// Stop the runnable on the backend, best-effort.
    async fn stop(&self, runnable: &mut Self::Runnable) -> Result<(), FrameworkError>;

    /// Report the backend's view of the runnable's state.
    async fn status(&self, runnable: &Self::Runnable) -> Result<RunState, FrameworkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(FrameworkError::Transient("503".to_string()).is_transient());
        assert!(FrameworkError::Timeout.is_transient());
        assert!(!FrameworkError::Rejected("bad manifest".to_string()).is_transient());
    }
}
