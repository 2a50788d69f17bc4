// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for corsa-core.
//!
//! One unified error covers the orchestration core; backend and store layers
//! have their own enums (`FrameworkError`, `StoreError`) that convert into it.

use thiserror::Error;
use uuid::Uuid;

use crate::framework::FrameworkError;
use crate::state::{LifecycleEvent, RunState};
use crate::store::StoreError;

/// Result type using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur while orchestrating runs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// No spec factory is registered for a `(runtime, kind, entity)` triple.
    #[error("no spec registered for runtime '{runtime}', kind '{kind}', entity '{entity}'")]
    UnknownSpecKind {
        /// Runtime axis of the lookup (empty for the generic runtime).
        runtime: String,
        /// Kind discriminator of the lookup.
        kind: String,
        /// Entity type of the lookup.
        entity: String,
    },

    /// A state change was requested that is not legal from the current state.
    #[error("illegal transition for run '{run_id}': {event} not allowed from {state}")]
    IllegalTransition {
        /// Run the transition was requested for.
        run_id: Uuid,
        /// Current state of the run.
        state: RunState,
        /// Event that was rejected.
        event: LifecycleEvent,
    },

    /// A runnable declares a backend with no registered framework.
    #[error("no framework registered under '{framework}'")]
    UnknownFramework {
        /// The backend name that failed to resolve.
        framework: String,
    },

    /// A backend call failed.
    #[error("framework error: {0}")]
    Framework(#[from] FrameworkError),

    /// A store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Encoding or decoding of a wire payload failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A referenced entity does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Entity type name ("function", "task", "run", "runnable").
        entity: &'static str,
        /// Identifier that failed to resolve.
        id: String,
    },

    /// Input validation failed.
    #[error("validation error for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },
}

impl From<rmp_serde::encode::Error> for CoreError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        CoreError::Encoding(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for CoreError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        CoreError::Encoding(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Encoding(err.to_string())
    }
}
