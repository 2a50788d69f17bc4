// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The "local" framework: supervised host processes.
//!
//! Children are spawned with `kill_on_drop` so nothing outlives the control
//! plane. Exit results are kept in a reaped-table; a runnable whose child is
//! neither running nor reaped (a previous process generation) is reported
//! failed rather than silently re-run.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use corsa_core::framework::{Framework, FrameworkError};
use corsa_core::runnable::Runnable;
use corsa_core::state::RunState;

use crate::FRAMEWORK_LOCAL;
use crate::runner::LocalRunnable;

#[derive(Default)]
struct ProcessTable {
    children: HashMap<Uuid, Child>,
    reaped: HashMap<Uuid, RunState>,
}

/// Framework running runnables as host processes.
#[derive(Default)]
pub struct LocalFramework {
    table: Arc<Mutex<ProcessTable>>,
}

impl LocalFramework {
    /// Create a framework with an empty process table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of children currently tracked as running.
    pub async fn tracked(&self) -> usize {
        self.table.lock().await.children.len()
    }
}

#[async_trait]
impl Framework for LocalFramework {
    type Runnable = LocalRunnable;

    fn name(&self) -> &'static str {
        FRAMEWORK_LOCAL
    }

    async fn execute(&self, runnable: &mut LocalRunnable) -> Result<(), FrameworkError> {
        let mut table = self.table.lock().await;

        // Replayed submission of a tracked or finished process is a no-op.
        if table.children.contains_key(&runnable.id) || table.reaped.contains_key(&runnable.id) {
            debug!(runnable_id = %runnable.id, "process already tracked, treating as submitted");
            runnable.set_message(Some("process already spawned".to_string()));
            return Ok(());
        }

        let mut command = Command::new(&runnable.command);
        command
            .args(&runnable.args)
            .envs(runnable.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &runnable.workdir {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|e| {
            FrameworkError::Rejected(format!("failed to spawn '{}': {e}", runnable.command))
        })?;

        info!(
            runnable_id = %runnable.id,
            command = %runnable.command,
            pid = ?child.id(),
            "process spawned"
        );
        runnable.set_message(Some(format!(
            "process spawned (pid {:?})",
            child.id()
        )));
        table.children.insert(runnable.id, child);
        Ok(())
    }

    async fn stop(&self, runnable: &mut LocalRunnable) -> Result<(), FrameworkError> {
        let mut table = self.table.lock().await;

        let Some(mut child) = table.children.remove(&runnable.id) else {
            debug!(runnable_id = %runnable.id, "stop with no tracked process is a no-op");
            return Ok(());
        };

        if let Err(e) = child.kill().await {
            warn!(runnable_id = %runnable.id, error = %e, "kill failed");
        }
        table.reaped.insert(runnable.id, RunState::Stopped);
        info!(runnable_id = %runnable.id, "process stopped");
        runnable.set_message(Some("process killed on request".to_string()));
        Ok(())
    }

    async fn status(&self, runnable: &LocalRunnable) -> Result<RunState, FrameworkError> {
        let mut table = self.table.lock().await;

        if let Some(state) = table.reaped.get(&runnable.id) {
            return Ok(*state);
        }

        match table.children.get_mut(&runnable.id) {
            Some(child) => match child.try_wait() {
                Ok(None) => Ok(RunState::Running),
                Ok(Some(status)) => {
                    let state = if status.success() {
                        RunState::Completed
                    } else {
                        RunState::Error
                    };
                    debug!(runnable_id = %runnable.id, %status, "process exited");
                    table.children.remove(&runnable.id);
                    table.reaped.insert(runnable.id, state);
                    Ok(state)
                }
                Err(e) => Err(FrameworkError::Io(e)),
            },
            // Not tracked and not reaped. Before dispatch there is nothing
            // to observe; past it, the supervising process is gone (e.g. a
            // restart) and host children do not survive it.
            None => match runnable.state {
                RunState::Created | RunState::Built | RunState::Ready => Ok(runnable.state),
                state if state.is_terminal() => Ok(state),
                _ => Ok(RunState::Error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::LocalRunnable;

    fn runnable(command: &str, args: &[&str]) -> LocalRunnable {
        LocalRunnable {
            id: Uuid::new_v4(),
            project: "proj".to_string(),
            state: RunState::Built,
            error: None,
            message: None,
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            workdir: None,
            env: Vec::new(),
            timeout_secs: None,
        }
    }

    #[tokio::test]
    async fn spawn_poll_and_reap() {
        let framework = LocalFramework::new();
        let mut r = runnable("/bin/sh", &["-c", "exit 0"]);

        framework.execute(&mut r).await.unwrap();
        assert_eq!(framework.tracked().await, 1);

        // The child exits promptly; poll until reaped.
        let state = loop {
            let state = framework.status(&r).await.unwrap();
            if state != RunState::Running {
                break state;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        };
        assert_eq!(state, RunState::Completed);
        assert_eq!(framework.tracked().await, 0);

        // The result is remembered after reaping.
        assert_eq!(framework.status(&r).await.unwrap(), RunState::Completed);
    }

    #[tokio::test]
    async fn nonzero_exit_is_error() {
        let framework = LocalFramework::new();
        let mut r = runnable("/bin/sh", &["-c", "exit 3"]);
        framework.execute(&mut r).await.unwrap();

        let state = loop {
            let state = framework.status(&r).await.unwrap();
            if state != RunState::Running {
                break state;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        };
        assert_eq!(state, RunState::Error);
    }

    #[tokio::test]
    async fn duplicate_execute_is_a_no_op() {
        let framework = LocalFramework::new();
        let mut r = runnable("/bin/sh", &["-c", "sleep 5"]);

        framework.execute(&mut r).await.unwrap();
        framework.execute(&mut r).await.unwrap();
        assert_eq!(framework.tracked().await, 1);

        framework.stop(&mut r).await.unwrap();
        assert_eq!(framework.status(&r).await.unwrap(), RunState::Stopped);
    }

    #[tokio::test]
    async fn spawn_failure_is_rejected() {
        let framework = LocalFramework::new();
        let mut r = runnable("/nonexistent/binary", &[]);

        let err = framework.execute(&mut r).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn untracked_live_runnable_reports_error() {
        let framework = LocalFramework::new();
        let mut r = runnable("/bin/sh", &[]);
        r.state = RunState::Running;

        // No child was ever spawned by this process generation.
        assert_eq!(framework.status(&r).await.unwrap(), RunState::Error);
    }
}
