// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Builder resolving run specs for the "k8s-job" backend.

use corsa_core::builder::{Builder, compose_run_spec};
use corsa_core::error::Result;
use corsa_core::spec::ConfigurableSpec;

use crate::spec::{ContainerFunctionSpec, K8sJobRunSpec, K8sJobTaskSpec};

/// Builder for the "k8s-job" backend.
pub struct K8sJobBuilder;

impl Builder for K8sJobBuilder {
    type Function = ContainerFunctionSpec;
    type Task = K8sJobTaskSpec;
    type Run = K8sJobRunSpec;

    fn build(
        &self,
        function: &ContainerFunctionSpec,
        task: &K8sJobTaskSpec,
        template: &K8sJobRunSpec,
    ) -> Result<K8sJobRunSpec> {
        let merged = compose_run_spec(function.to_map(), task.to_map(), template.to_map());
        let mut resolved = K8sJobRunSpec::default();
        resolved.configure(&merged)?;
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corsa_core::spec::SpecMap;
    use serde_json::json;

    fn map(value: serde_json::Value) -> SpecMap {
        match value {
            serde_json::Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn empty_template_carries_specs_unchanged() {
        let mut function = ContainerFunctionSpec::default();
        function.configure(&map(json!({"image": "x"}))).unwrap();
        let mut task = K8sJobTaskSpec::default();
        task.configure(&map(json!({"function": "f"}))).unwrap();

        let resolved = K8sJobBuilder
            .build(&function, &task, &K8sJobRunSpec::default())
            .unwrap();

        assert_eq!(resolved.function, function);
        assert_eq!(resolved.task, task);
    }

    #[test]
    fn template_task_override_wins() {
        let mut function = ContainerFunctionSpec::default();
        function.configure(&map(json!({"image": "x"}))).unwrap();
        let mut task = K8sJobTaskSpec::default();
        task.configure(&map(json!({
            "function": "f",
            "node_selector": {"pool": "cpu"},
            "backoff_limit": 4,
        })))
        .unwrap();

        let mut template = K8sJobRunSpec::default();
        template
            .configure(&map(json!({
                "task": {"node_selector": {"pool": "gpu"}},
                "inputs": {"EPOCHS": 3},
            })))
            .unwrap();

        let resolved = K8sJobBuilder.build(&function, &task, &template).unwrap();

        assert_eq!(
            resolved.task.node_selector.get("pool"),
            Some(&json!("gpu"))
        );
        // Non-overridden task defaults survive.
        assert_eq!(resolved.task.backoff_limit, Some(4));
        assert_eq!(resolved.task.function.as_deref(), Some("f"));
        assert_eq!(resolved.inputs.get("EPOCHS"), Some(&json!(3)));
    }

    #[test]
    fn build_does_not_mutate_inputs() {
        let mut function = ContainerFunctionSpec::default();
        function.configure(&map(json!({"image": "x"}))).unwrap();
        let function_before = function.clone();
        let task = K8sJobTaskSpec::default();
        let template = K8sJobRunSpec::default();

        let _ = K8sJobBuilder.build(&function, &task, &template).unwrap();
        assert_eq!(function, function_before);
    }
}
