// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The runner contract: project a run into its backend-facing runnable.

use crate::error::Result;
use crate::model::Run;
use crate::runnable::Runnable;

/// Turns a resolved run into a runnable for one specific backend.
///
/// `produce` must be pure given the run's resolved spec, must propagate the
/// run's id and project onto the runnable (the dispatch loop and store
/// correlate the two by id), and must encode everything the framework needs
/// so it never has to read the run back.
pub trait Runner: Send + Sync + 'static {
    /// Concrete runnable type produced by this runner.
    type Output: Runnable;

    /// Produce the runnable.
    fn produce(&self, run: &Run) -> Result<Self::Output>;
}
