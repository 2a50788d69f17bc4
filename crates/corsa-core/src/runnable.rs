// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The runnable contract and its wire codec.
//!
//! A runnable is the backend-facing projection of a run: everything the
//! framework needs to act, persisted independently so the dispatch loop can
//! resume after a crash without re-deriving it from the run. Its wire shape
//! is MessagePack with named fields, byte-stable across restarts.

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::Result;
use crate::state::RunState;

/// A serializable, backend-targeted execution descriptor.
///
/// Implementations add backend-specific payload fields; the common accessors
/// below are what the dispatch loop, monitor, and stores operate on. A
/// runnable is immutable once dispatched except for its state, error, and
/// message fields.
pub trait Runnable:
    Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Identifier, equal to the id of the run that produced it.
    fn id(&self) -> Uuid;

    /// Owning project, propagated from the run.
    fn project(&self) -> &str;

    /// Name of the backend responsible for executing this runnable.
    fn framework(&self) -> &str;

    /// Last known lifecycle state.
    fn state(&self) -> RunState;

    /// Update the lifecycle state.
    fn set_state(&mut self, state: RunState);

    /// Diagnostic message of the most recent failure, if any.
    fn error(&self) -> Option<&str>;

    /// Record or clear the failure diagnostic.
    fn set_error(&mut self, error: Option<String>);

    /// Human-readable progress message, if any.
    fn message(&self) -> Option<&str>;

    /// Record or clear the progress message.
    fn set_message(&mut self, message: Option<String>);
}

/// Encode a runnable into its stable wire form.
pub fn to_wire<R: Runnable>(runnable: &R) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(runnable)?)
}

/// Decode a runnable from its wire form.
pub fn from_wire<R: Runnable>(bytes: &[u8]) -> Result<R> {
    Ok(rmp_serde::from_slice(bytes)?)
}
