// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Jobs API client abstraction.
//!
//! The framework talks to the cluster through this trait so transports stay
//! swappable; [`FakeJobsApi`] is the in-memory implementation used by tests
//! and local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors from the Jobs API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JobsApiError {
    /// An object with the same name already exists in the namespace.
    #[error("job already exists")]
    AlreadyExists,

    /// The named job does not exist.
    #[error("job not found")]
    NotFound,

    /// The API server rejected the manifest.
    #[error("manifest rejected: {0}")]
    Rejected(String),

    /// A transient API failure (network, throttling, server outage).
    #[error("transient API failure: {0}")]
    Transient(String),
}

/// Observed phase of a job on the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    /// Accepted but no pod scheduled yet.
    Pending,
    /// At least one pod is running.
    Active,
    /// The job finished successfully.
    Succeeded,
    /// The job exhausted its backoff limit.
    Failed,
}

/// Minimal Jobs API surface the framework needs.
#[async_trait]
pub trait JobsApi: Send + Sync {
    /// Create a job from a manifest.
    async fn submit(&self, namespace: &str, manifest: &Value) -> Result<(), JobsApiError>;

    /// Delete a job by name, foreground propagation.
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), JobsApiError>;

    /// Observe a job's phase.
    async fn phase(&self, namespace: &str, name: &str) -> Result<JobPhase, JobsApiError>;
}

#[derive(Debug, Clone)]
struct FakeJob {
    manifest: Value,
    phase: JobPhase,
}

/// In-memory Jobs API for tests and local development.
pub struct FakeJobsApi {
    jobs: Mutex<HashMap<(String, String), FakeJob>>,
    submits: AtomicUsize,
    /// The first N submits fail with a transient error.
    pub fail_submits: AtomicUsize,
    /// Every submit fails with a rejection.
    pub reject_submits: AtomicBool,
}

impl FakeJobsApi {
    /// Create an empty fake cluster.
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            submits: AtomicUsize::new(0),
            fail_submits: AtomicUsize::new(0),
            reject_submits: AtomicBool::new(false),
        }
    }

    /// Number of submit calls that reached the fake API.
    pub fn submit_calls(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    /// Move a job to a phase, as the cluster would over time.
    pub async fn set_phase(&self, namespace: &str, name: &str, phase: JobPhase) {
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.get_mut(&(namespace.to_string(), name.to_string())) {
            job.phase = phase;
        }
    }

    /// Pre-create a job, as if an earlier submission had landed.
    pub async fn seed_job(&self, namespace: &str, name: &str, phase: JobPhase) {
        self.jobs.lock().await.insert(
            (namespace.to_string(), name.to_string()),
            FakeJob {
                manifest: Value::Null,
                phase,
            },
        );
    }

    /// The manifest a job was submitted with.
    pub async fn manifest(&self, namespace: &str, name: &str) -> Option<Value> {
        self.jobs
            .lock()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .map(|job| job.manifest.clone())
    }
}

impl Default for FakeJobsApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobsApi for FakeJobsApi {
    async fn submit(&self, namespace: &str, manifest: &Value) -> Result<(), JobsApiError> {
        self.submits.fetch_add(1, Ordering::SeqCst);

        if self.reject_submits.load(Ordering::SeqCst) {
            return Err(JobsApiError::Rejected("invalid manifest".to_string()));
        }
        let remaining = self.fail_submits.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_submits.store(remaining - 1, Ordering::SeqCst);
            return Err(JobsApiError::Transient("apiserver unavailable".to_string()));
        }

        let name = manifest
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .ok_or_else(|| JobsApiError::Rejected("manifest has no metadata.name".to_string()))?
            .to_string();

        let mut jobs = self.jobs.lock().await;
        let key = (namespace.to_string(), name);
        if jobs.contains_key(&key) {
            return Err(JobsApiError::AlreadyExists);
        }
        jobs.insert(
            key,
            FakeJob {
                manifest: manifest.clone(),
                phase: JobPhase::Pending,
            },
        );
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), JobsApiError> {
        let mut jobs = self.jobs.lock().await;
        match jobs.remove(&(namespace.to_string(), name.to_string())) {
            Some(_) => Ok(()),
            None => Err(JobsApiError::NotFound),
        }
    }

    async fn phase(&self, namespace: &str, name: &str) -> Result<JobPhase, JobsApiError> {
        let jobs = self.jobs.lock().await;
        jobs.get(&(namespace.to_string(), name.to_string()))
            .map(|job| job.phase)
            .ok_or(JobsApiError::NotFound)
    }
}
