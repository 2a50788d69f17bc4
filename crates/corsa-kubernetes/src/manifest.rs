// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kubernetes Job manifest construction.

use serde_json::{Value, json};

use crate::runner::K8sJobRunnable;

/// Labels stamped on every job object, keyed back to the run.
pub const LABEL_RUN_ID: &str = "corsa.dev/run-id";
/// Label carrying the owning project.
pub const LABEL_PROJECT: &str = "corsa.dev/project";

/// Build the `batch/v1` Job manifest for a runnable.
pub fn job_manifest(runnable: &K8sJobRunnable) -> Value {
    let mut container = json!({
        "name": "main",
        "image": runnable.image,
    });
    if !runnable.command.is_empty() {
        container["command"] = json!(runnable.command);
    }
    if !runnable.args.is_empty() {
        container["args"] = json!(runnable.args);
    }
    if !runnable.env.is_empty() {
        container["env"] = json!(runnable.env);
    }
    if !runnable.resources.is_empty() {
        container["resources"] = Value::Object(runnable.resources.clone());
    }

    let mut pod_spec = json!({
        "restartPolicy": "Never",
        "containers": [container],
    });
    if !runnable.node_selector.is_empty() {
        pod_spec["nodeSelector"] = Value::Object(runnable.node_selector.clone());
    }
    if !runnable.volumes.is_empty() {
        pod_spec["volumes"] = Value::Array(runnable.volumes.clone());
    }

    let mut job_spec = json!({
        "template": {
            "metadata": {
                "labels": {
                    LABEL_RUN_ID: runnable.id.to_string(),
                    LABEL_PROJECT: runnable.project,
                }
            },
            "spec": pod_spec,
        }
    });
    if let Some(limit) = runnable.backoff_limit {
        job_spec["backoffLimit"] = json!(limit);
    }

    json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {
            "name": runnable.job_name,
            "namespace": runnable.namespace,
            "labels": {
                LABEL_RUN_ID: runnable.id.to_string(),
                LABEL_PROJECT: runnable.project,
            }
        },
        "spec": job_spec,
    })
}
