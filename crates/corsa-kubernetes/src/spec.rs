// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Spec types for the Kubernetes Jobs backend.

use serde_json::Value;

use corsa_core::error::Result;
use corsa_core::spec::{
    ConfigurableSpec, SpecMap, put_opt, put_vec, take_map, take_string, take_string_vec, take_u64,
};

/// Function spec of a containerized workload: what image to run and how.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ContainerFunctionSpec {
    /// Container image reference.
    pub image: Option<String>,
    /// Entrypoint override.
    pub command: Vec<String>,
    /// Arguments passed to the entrypoint.
    pub args: Vec<String>,
    /// Unclaimed fields, preserved verbatim.
    pub extra: SpecMap,
}

impl ConfigurableSpec for ContainerFunctionSpec {
    fn configure(&mut self, data: &SpecMap) -> Result<()> {
        let mut data = data.clone();
        self.image = take_string(&mut data, "image");
        self.command = take_string_vec(&mut data, "command");
        self.args = take_string_vec(&mut data, "args");
        self.extra = data;
        Ok(())
    }

    fn to_map(&self) -> SpecMap {
        let mut out = self.extra.clone();
        put_opt(&mut out, "image", self.image.as_deref());
        put_vec(&mut out, "command", &self.command);
        put_vec(&mut out, "args", &self.args);
        out
    }
}

/// Task spec binding a container function to the Jobs execution profile.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct K8sJobTaskSpec {
    /// Target function reference.
    pub function: Option<String>,
    /// Cron-style schedule, when the job is recurring.
    pub schedule: Option<String>,
    /// Node selector labels.
    pub node_selector: SpecMap,
    /// Resource requests and limits.
    pub resources: SpecMap,
    /// Volume definitions, passed through to the pod spec.
    pub volumes: Vec<Value>,
    /// Kubernetes backoff limit for the job.
    pub backoff_limit: Option<u64>,
    /// Unclaimed fields, preserved verbatim.
    pub extra: SpecMap,
}

impl ConfigurableSpec for K8sJobTaskSpec {
    fn configure(&mut self, data: &SpecMap) -> Result<()> {
        let mut data = data.clone();
        self.function = take_string(&mut data, "function");
        self.schedule = take_string(&mut data, "schedule");
        self.node_selector = take_map(&mut data, "node_selector").unwrap_or_default();
        self.resources = take_map(&mut data, "resources").unwrap_or_default();
        self.volumes = match data.remove("volumes") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        self.backoff_limit = take_u64(&mut data, "backoff_limit");
        self.extra = data;
        Ok(())
    }

    fn to_map(&self) -> SpecMap {
        let mut out = self.extra.clone();
        put_opt(&mut out, "function", self.function.as_deref());
        put_opt(&mut out, "schedule", self.schedule.as_deref());
        if !self.node_selector.is_empty() {
            out.insert(
                "node_selector".to_string(),
                Value::Object(self.node_selector.clone()),
            );
        }
        if !self.resources.is_empty() {
            out.insert("resources".to_string(), Value::Object(self.resources.clone()));
        }
        if !self.volumes.is_empty() {
            out.insert("volumes".to_string(), Value::Array(self.volumes.clone()));
        }
        if let Some(limit) = self.backoff_limit {
            out.insert("backoff_limit".to_string(), Value::from(limit));
        }
        out
    }
}

/// Resolved run spec: the task and function specs nested as sub-objects,
/// plus run-scoped inputs.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct K8sJobRunSpec {
    /// Resolved task spec.
    pub task: K8sJobTaskSpec,
    /// Resolved function spec.
    pub function: ContainerFunctionSpec,
    /// Run-scoped inputs, exposed to the container as environment.
    pub inputs: SpecMap,
    /// Unclaimed fields, preserved verbatim.
    pub extra: SpecMap,
}

impl ConfigurableSpec for K8sJobRunSpec {
    fn configure(&mut self, data: &SpecMap) -> Result<()> {
        let mut data = data.clone();
        self.task = K8sJobTaskSpec::default();
        if let Some(task) = take_map(&mut data, "task") {
            self.task.configure(&task)?;
        }
        self.function = ContainerFunctionSpec::default();
        if let Some(function) = take_map(&mut data, "function") {
            self.function.configure(&function)?;
        }
        self.inputs = take_map(&mut data, "inputs").unwrap_or_default();
        self.extra = data;
        Ok(())
    }

    fn to_map(&self) -> SpecMap {
        let mut out = self.extra.clone();
        out.insert("task".to_string(), Value::Object(self.task.to_map()));
        out.insert("function".to_string(), Value::Object(self.function.to_map()));
        if !self.inputs.is_empty() {
            out.insert("inputs".to_string(), Value::Object(self.inputs.clone()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> SpecMap {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn function_spec_round_trip_with_extras() {
        let data = map(json!({
            "image": "ghcr.io/acme/trainer:v3",
            "command": ["python", "train.py"],
            "args": ["--epochs", "10"],
            "gpu_profile": "a100",
        }));

        let mut spec = ContainerFunctionSpec::default();
        spec.configure(&data).unwrap();
        assert_eq!(spec.image.as_deref(), Some("ghcr.io/acme/trainer:v3"));
        assert_eq!(spec.command, vec!["python", "train.py"]);
        assert_eq!(spec.extra.get("gpu_profile"), Some(&json!("a100")));

        let mut again = ContainerFunctionSpec::default();
        again.configure(&spec.to_map()).unwrap();
        assert_eq!(again, spec);
    }

    #[test]
    fn task_spec_round_trip() {
        let data = map(json!({
            "function": "trainer",
            "node_selector": {"pool": "gpu"},
            "resources": {"limits": {"nvidia.com/gpu": 1}},
            "volumes": [{"name": "scratch", "emptyDir": {}}],
            "backoff_limit": 2,
            "ttl_seconds": 3600,
        }));

        let mut spec = K8sJobTaskSpec::default();
        spec.configure(&data).unwrap();
        assert_eq!(spec.backoff_limit, Some(2));
        assert_eq!(spec.volumes.len(), 1);
        assert_eq!(spec.extra.get("ttl_seconds"), Some(&json!(3600)));

        let mut again = K8sJobTaskSpec::default();
        again.configure(&spec.to_map()).unwrap();
        assert_eq!(again, spec);
    }

    #[test]
    fn run_spec_round_trip_nests_typed_specs() {
        let data = map(json!({
            "task": {"function": "trainer", "node_selector": {"pool": "gpu"}},
            "function": {"image": "x", "custom": true},
            "inputs": {"epochs": 10},
            "trace_id": "abc123",
        }));

        let mut spec = K8sJobRunSpec::default();
        spec.configure(&data).unwrap();
        assert_eq!(spec.function.image.as_deref(), Some("x"));
        assert_eq!(spec.task.function.as_deref(), Some("trainer"));
        assert_eq!(spec.inputs.get("epochs"), Some(&json!(10)));
        assert_eq!(spec.extra.get("trace_id"), Some(&json!("abc123")));

        let mut again = K8sJobRunSpec::default();
        again.configure(&spec.to_map()).unwrap();
        assert_eq!(again, spec);
    }

    #[test]
    fn configure_resets_previous_state() {
        let mut spec = K8sJobRunSpec::default();
        spec.configure(&map(json!({"function": {"image": "first"}})))
            .unwrap();
        spec.configure(&map(json!({"inputs": {"a": 1}}))).unwrap();

        assert_eq!(spec.function.image, None);
        assert_eq!(spec.inputs.get("a"), Some(&json!(1)));
    }
}
