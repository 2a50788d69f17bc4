// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runner projecting runs into local process runnables.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use corsa_core::error::{CoreError, Result};
use corsa_core::model::Run;
use corsa_core::runnable::Runnable;
use corsa_core::runner::Runner;
use corsa_core::spec::ConfigurableSpec;
use corsa_core::state::RunState;

use crate::FRAMEWORK_LOCAL;
use crate::spec::LocalRunSpec;

/// Backend-facing descriptor of one supervised host process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRunnable {
    /// Run identifier.
    pub id: Uuid,
    /// Owning project.
    pub project: String,
    /// Lifecycle state.
    pub state: RunState,
    /// Failure diagnostic.
    pub error: Option<String>,
    /// Progress message.
    pub message: Option<String>,
    /// Program to execute.
    pub command: String,
    /// Program arguments.
    pub args: Vec<String>,
    /// Working directory.
    pub workdir: Option<String>,
    /// Process environment derived from run inputs.
    pub env: Vec<(String, String)>,
    /// Kill the process after this many seconds.
    pub timeout_secs: Option<u64>,
}

impl Runnable for LocalRunnable {
    fn id(&self) -> Uuid {
        self.id
    }
    fn project(&self) -> &str {
        &self.project
    }
    fn framework(&self) -> &str {
        FRAMEWORK_LOCAL
    }
    fn state(&self) -> RunState {
        self.state
    }
    fn set_state(&mut self, state: RunState) {
        self.state = state;
    }
    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
    fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }
    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
    fn set_message(&mut self, message: Option<String>) {
        self.message = message;
    }
}

/// Runner for the "local" backend.
pub struct LocalRunner;

impl Runner for LocalRunner {
    type Output = LocalRunnable;

    fn produce(&self, run: &Run) -> Result<LocalRunnable> {
        let mut spec = LocalRunSpec::default();
        spec.configure(&run.spec)?;

        let command = spec.function.command.ok_or_else(|| CoreError::Validation {
            field: "function.command".to_string(),
            message: "a command is required to run a local process".to_string(),
        })?;

        let env = spec
            .inputs
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect();

        Ok(LocalRunnable {
            id: run.id,
            project: run.project.clone(),
            state: RunState::Created,
            error: None,
            message: None,
            command,
            args: spec.function.args,
            workdir: spec.task.workdir,
            env,
            timeout_secs: spec.task.timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corsa_core::model::RunLocator;
    use corsa_core::spec::SpecMap;
    use serde_json::json;

    fn run_with_spec(spec: serde_json::Value) -> Run {
        let map = match spec {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        };
        Run::new(
            "proj",
            RunLocator {
                kind: FRAMEWORK_LOCAL.to_string(),
                action: "run".to_string(),
                project: "proj".to_string(),
                function: "fn".to_string(),
                version: "v1".to_string(),
            },
            map,
        )
    }

    #[test]
    fn produce_carries_the_process_description() {
        let run = run_with_spec(json!({
            "function": {"command": "/bin/sh", "args": ["-c", "exit 0"]},
            "task": {"workdir": "/tmp", "timeout_secs": 5},
            "inputs": {"MODE": "fast"},
        }));

        let runnable = LocalRunner.produce(&run).unwrap();
        assert_eq!(runnable.id, run.id);
        assert_eq!(runnable.command, "/bin/sh");
        assert_eq!(runnable.args, vec!["-c", "exit 0"]);
        assert_eq!(runnable.workdir.as_deref(), Some("/tmp"));
        assert_eq!(runnable.env, vec![("MODE".to_string(), "fast".to_string())]);
        assert_eq!(runnable.timeout_secs, Some(5));
    }

    #[test]
    fn produce_requires_a_command() {
        let run = run_with_spec(json!({"task": {}}));
        assert!(LocalRunner.produce(&run).is_err());
    }

    #[test]
    fn empty_spec_map_fails_cleanly() {
        let run = Run::new(
            "proj",
            RunLocator {
                kind: FRAMEWORK_LOCAL.to_string(),
                action: "run".to_string(),
                project: "proj".to_string(),
                function: "fn".to_string(),
                version: "v1".to_string(),
            },
            SpecMap::new(),
        );
        assert!(LocalRunner.produce(&run).is_err());
    }
}
