// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Builder resolving run specs for the "local" backend.

use corsa_core::builder::{Builder, compose_run_spec};
use corsa_core::error::Result;
use corsa_core::spec::ConfigurableSpec;

use crate::spec::{LocalRunSpec, LocalTaskSpec, ShellFunctionSpec};

/// Builder for the "local" backend.
pub struct LocalBuilder;

impl Builder for LocalBuilder {
    type Function = ShellFunctionSpec;
    type Task = LocalTaskSpec;
    type Run = LocalRunSpec;

    fn build(
        &self,
        function: &ShellFunctionSpec,
        task: &LocalTaskSpec,
        template: &LocalRunSpec,
    ) -> Result<LocalRunSpec> {
        let merged = compose_run_spec(function.to_map(), task.to_map(), template.to_map());
        let mut resolved = LocalRunSpec::default();
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
    fn override_replaces_workdir_only() {
        let mut function = ShellFunctionSpec::default();
        function
            .configure(&map(json!({"command": "/bin/true"})))
            .unwrap();
        let mut task = LocalTaskSpec::default();
        task.configure(&map(json!({"workdir": "/srv", "timeout_secs": 30})))
            .unwrap();
        let mut template = LocalRunSpec::default();
        template
            .configure(&map(json!({"task": {"workdir": "/tmp"}})))
            .unwrap();

        let resolved = LocalBuilder.build(&function, &task, &template).unwrap();
        assert_eq!(resolved.task.workdir.as_deref(), Some("/tmp"));
        assert_eq!(resolved.task.timeout_secs, Some(30));
        assert_eq!(resolved.function.command.as_deref(), Some("/bin/true"));
    }
}
