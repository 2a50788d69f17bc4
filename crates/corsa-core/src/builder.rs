// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The builder contract: resolve one run spec from a (function, task,
//! template) triple.

use serde_json::Value;

use crate::error::Result;
use crate::spec::{ConfigurableSpec, SpecMap};

/// Key under which the task spec nests inside a run spec.
pub const TASK_KEY: &str = "task";
/// Key under which the function spec nests inside a run spec.
pub const FUNCTION_KEY: &str = "function";

/// Combines a function spec, a task spec, and a caller-supplied run spec
/// template into one fully-resolved run spec.
///
/// Implementations must be deterministic and side-effect-free, and must not
/// mutate their inputs. Each backend integration supplies its own builder
/// over its own concrete spec types.
pub trait Builder: Send + Sync + 'static {
    /// Concrete function spec type.
    type Function: ConfigurableSpec + Default;
    /// Concrete task spec type.
    type Task: ConfigurableSpec + Default;
    /// Concrete run spec type.
    type Run: ConfigurableSpec + Default;

    /// Resolve the run spec.
    fn build(
        &self,
        function: &Self::Function,
        task: &Self::Task,
        template: &Self::Run,
    ) -> Result<Self::Run>;
}

/// Merge a (function, task, template) triple of open maps into one resolved
/// run spec map.
///
/// Starts from the template; a nested task map inside the template is a
/// caller override and wins key-by-key over the task's stored defaults. The
/// (possibly overridden) task spec and the function spec are attached as
/// sub-objects of the result.
pub fn compose_run_spec(function: SpecMap, task: SpecMap, template: SpecMap) -> SpecMap {
    let mut out = template;
    let mut task = task;

    if let Some(Value::Object(overrides)) = out.remove(TASK_KEY) {
        for (key, value) in overrides {
            task.insert(key, value);
        }
    }

    out.insert(TASK_KEY.to_string(), Value::Object(task));
    out.insert(FUNCTION_KEY.to_string(), Value::Object(function));
    out
}
