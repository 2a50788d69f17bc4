// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Spec types for the local process backend.

use serde_json::Value;

use corsa_core::error::Result;
use corsa_core::spec::{
    ConfigurableSpec, SpecMap, put_opt, put_vec, take_map, take_string, take_string_vec, take_u64,
};

/// Function spec of a shell workload: the program to run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ShellFunctionSpec {
    /// Program to execute.
    pub command: Option<String>,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Unclaimed fields, preserved verbatim.
    pub extra: SpecMap,
}

impl ConfigurableSpec for ShellFunctionSpec {
    fn configure(&mut self, data: &SpecMap) -> Result<()> {
        let mut data = data.clone();
        self.command = take_string(&mut data, "command");
        self.args = take_string_vec(&mut data, "args");
        self.extra = data;
        Ok(())
    }

    fn to_map(&self) -> SpecMap {
        let mut out = self.extra.clone();
        put_opt(&mut out, "command", self.command.as_deref());
        put_vec(&mut out, "args", &self.args);
        out
    }
}

/// Task spec binding a shell function to the local execution profile.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LocalTaskSpec {
    /// Target function reference.
    pub function: Option<String>,
    /// Working directory for the process.
    pub workdir: Option<String>,
    /// Kill the process after this many seconds.
    pub timeout_secs: Option<u64>,
    /// Unclaimed fields, preserved verbatim.
    pub extra: SpecMap,
}

impl ConfigurableSpec for LocalTaskSpec {
    fn configure(&mut self, data: &SpecMap) -> Result<()> {
        let mut data = data.clone();
        self.function = take_string(&mut data, "function");
        self.workdir = take_string(&mut data, "workdir");
        self.timeout_secs = take_u64(&mut data, "timeout_secs");
        self.extra = data;
        Ok(())
    }

    fn to_map(&self) -> SpecMap {
        let mut out = self.extra.clone();
        put_opt(&mut out, "function", self.function.as_deref());
        put_opt(&mut out, "workdir", self.workdir.as_deref());
        if let Some(timeout) = self.timeout_secs {
            out.insert("timeout_secs".to_string(), Value::from(timeout));
        }
        out
    }
}

/// Resolved run spec for a local process run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LocalRunSpec {
    /// Resolved task spec.
    pub task: LocalTaskSpec,
    /// Resolved function spec.
    pub function: ShellFunctionSpec,
    /// Run-scoped inputs, exposed as process environment.
    pub inputs: SpecMap,
    /// Unclaimed fields, preserved verbatim.
    pub extra: SpecMap,
}

impl ConfigurableSpec for LocalRunSpec {
    fn configure(&mut self, data: &SpecMap) -> Result<()> {
        let mut data = data.clone();
        self.task = LocalTaskSpec::default();
        if let Some(task) = take_map(&mut data, "task") {
            self.task.configure(&task)?;
        }
        self.function = ShellFunctionSpec::default();
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
