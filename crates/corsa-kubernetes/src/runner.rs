// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runner projecting runs into Kubernetes job runnables.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use corsa_core::error::{CoreError, Result};
use corsa_core::model::Run;
use corsa_core::runnable::Runnable;
use corsa_core::runner::Runner;
use corsa_core::spec::{ConfigurableSpec, SpecMap};
use corsa_core::state::RunState;

use crate::FRAMEWORK_JOB;
use crate::spec::K8sJobRunSpec;

/// One container environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

/// Backend-facing descriptor of one Kubernetes job.
///
/// Carries everything the framework needs to build the manifest and to
/// correlate cluster objects back to the run, so execution never re-reads
/// the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct K8sJobRunnable {
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
    /// Target namespace.
    pub namespace: String,
    /// Deterministic job object name, derived from the run id.
    pub job_name: String,
    /// Container image.
    pub image: String,
    /// Entrypoint override.
    pub command: Vec<String>,
    /// Entrypoint arguments.
    pub args: Vec<String>,
    /// Container environment.
    pub env: Vec<EnvVar>,
    /// Node selector labels.
    pub node_selector: SpecMap,
    /// Resource requests and limits.
    pub resources: SpecMap,
    /// Pod volumes.
    pub volumes: Vec<Value>,
    /// Job backoff limit.
    pub backoff_limit: Option<u64>,
}

impl Runnable for K8sJobRunnable {
    fn id(&self) -> Uuid {
        self.id
    }
    fn project(&self) -> &str {
        &self.project
    }
    fn framework(&self) -> &str {
        FRAMEWORK_JOB
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

/// Deterministic job object name for a run.
///
/// Doubles as the idempotence key: re-submitting the same run collides on
/// this name and the collision is read as "already submitted".
pub fn job_name_for(run_id: Uuid) -> String {
    format!("corsa-{}", run_id)
}

/// Runner for the "k8s-job" backend.
pub struct K8sJobRunner {
    namespace: String,
}

impl K8sJobRunner {
    /// Create a runner targeting a namespace.
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
        }
    }
}

impl Runner for K8sJobRunner {
    type Output = K8sJobRunnable;

    fn produce(&self, run: &Run) -> Result<K8sJobRunnable> {
        let mut spec = K8sJobRunSpec::default();
        spec.configure(&run.spec)?;

        let image = spec.function.image.ok_or_else(|| CoreError::Validation {
            field: "function.image".to_string(),
            message: "a container image is required to run a job".to_string(),
        })?;

        let env = spec
            .inputs
            .iter()
            .map(|(key, value)| EnvVar {
                name: key.clone(),
                value: match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            })
            .collect();

        Ok(K8sJobRunnable {
            id: run.id,
            project: run.project.clone(),
            state: RunState::Created,
            error: None,
            message: None,
            namespace: self.namespace.clone(),
            job_name: job_name_for(run.id),
            image,
            command: spec.function.command,
            args: spec.function.args,
            env,
            node_selector: spec.task.node_selector,
            resources: spec.task.resources,
            volumes: spec.task.volumes,
            backoff_limit: spec.task.backoff_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corsa_core::model::RunLocator;
    use serde_json::json;

    fn run_with_spec(spec: Value) -> Run {
        let map = match spec {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        };
        Run::new(
            "proj",
            RunLocator {
                kind: FRAMEWORK_JOB.to_string(),
                action: "run".to_string(),
                project: "proj".to_string(),
                function: "fn".to_string(),
                version: "v1".to_string(),
            },
            map,
        )
    }

    #[test]
    fn produce_propagates_identity_and_payload() {
        let run = run_with_spec(json!({
            "function": {"image": "ghcr.io/acme/trainer:v3", "args": ["--fast"]},
            "task": {"node_selector": {"pool": "gpu"}, "backoff_limit": 1},
            "inputs": {"EPOCHS": 10},
        }));

        let runner = K8sJobRunner::new("corsa-jobs");
        let runnable = runner.produce(&run).unwrap();

        assert_eq!(runnable.id, run.id);
        assert_eq!(runnable.project, "proj");
        assert_eq!(runnable.framework(), FRAMEWORK_JOB);
        assert_eq!(runnable.job_name, format!("corsa-{}", run.id));
        assert_eq!(runnable.image, "ghcr.io/acme/trainer:v3");
        assert_eq!(runnable.args, vec!["--fast"]);
        assert_eq!(runnable.backoff_limit, Some(1));
        assert_eq!(
            runnable.env,
            vec![EnvVar {
                name: "EPOCHS".to_string(),
                value: "10".to_string()
            }]
        );
    }

    #[test]
    fn produce_requires_an_image() {
        let run = run_with_spec(json!({"task": {"function": "fn"}}));
        let err = K8sJobRunner::new("corsa-jobs").produce(&run).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn produce_is_deterministic() {
        let run = run_with_spec(json!({"function": {"image": "x"}}));
        let runner = K8sJobRunner::new("corsa-jobs");
        assert_eq!(runner.produce(&run).unwrap(), runner.produce(&run).unwrap());
    }
}
