// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The "k8s-job" framework.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use corsa_core::framework::{Framework, FrameworkError};
use corsa_core::runnable::Runnable;
use corsa_core::state::RunState;

use crate::FRAMEWORK_JOB;
use crate::client::{JobPhase, JobsApi, JobsApiError};
use crate::manifest::job_manifest;
use crate::runner::K8sJobRunnable;

/// Framework submitting runnables as Kubernetes Jobs.
pub struct K8sJobFramework {
    client: Arc<dyn JobsApi>,
}

impl K8sJobFramework {
    /// Create a framework over a Jobs API client.
    pub fn new(client: Arc<dyn JobsApi>) -> Self {
        Self { client }
    }
}

fn map_api_error(err: JobsApiError) -> FrameworkError {
    match err {
        JobsApiError::Rejected(reason) => FrameworkError::Rejected(reason),
        JobsApiError::Transient(reason) => FrameworkError::Transient(reason),
        JobsApiError::NotFound => FrameworkError::Transient("job not found".to_string()),
        JobsApiError::AlreadyExists => {
            // Callers that care handle this before mapping.
            FrameworkError::Rejected("job already exists".to_string())
        }
    }
}

#[async_trait]
impl Framework for K8sJobFramework {
    type Runnable = K8sJobRunnable;

    fn name(&self) -> &'static str {
        FRAMEWORK_JOB
    }

    async fn execute(&self, runnable: &mut K8sJobRunnable) -> Result<(), FrameworkError> {
        let manifest = job_manifest(runnable);

        match self.client.submit(&runnable.namespace, &manifest).await {
            Ok(()) => {
                info!(
                    job = %runnable.job_name,
                    namespace = %runnable.namespace,
                    "job submitted"
                );
                runnable.set_message(Some(format!("job '{}' submitted", runnable.job_name)));
                Ok(())
            }
            // The object name is derived from the run id: a collision means
            // this run was already submitted, which is success, not failure.
            Err(JobsApiError::AlreadyExists) => {
                debug!(job = %runnable.job_name, "job already exists, treating as submitted");
                runnable.set_message(Some(format!(
                    "job '{}' already submitted",
                    runnable.job_name
                )));
                Ok(())
            }
            Err(e) => Err(map_api_error(e)),
        }
    }

    async fn stop(&self, runnable: &mut K8sJobRunnable) -> Result<(), FrameworkError> {
        match self.client.delete(&runnable.namespace, &runnable.job_name).await {
            Ok(()) => {
                info!(job = %runnable.job_name, "job deleted on stop");
                runnable.set_message(Some(format!("job '{}' deleted", runnable.job_name)));
                Ok(())
            }
            // Nothing to stop is a successful stop.
            Err(JobsApiError::NotFound) => {
                debug!(job = %runnable.job_name, "job already gone on stop");
                Ok(())
            }
            Err(e) => {
                warn!(job = %runnable.job_name, error = %e, "stop failed");
                Err(map_api_error(e))
            }
        }
    }

    async fn status(&self, runnable: &K8sJobRunnable) -> Result<RunState, FrameworkError> {
        let phase = self
            .client
            .phase(&runnable.namespace, &runnable.job_name)
            .await
            .map_err(map_api_error)?;

        Ok(match phase {
            JobPhase::Pending => RunState::Pending,
            JobPhase::Active => RunState::Running,
            JobPhase::Succeeded => RunState::Completed,
            JobPhase::Failed => RunState::Error,
        })
    }
}
