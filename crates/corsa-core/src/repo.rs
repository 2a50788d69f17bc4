// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Entity-store collaborator interfaces.
//!
//! Flat entity persistence is an external concern; the core only needs these
//! narrow traits. The in-memory implementations serve embedding and tests;
//! the run store round-trips its records through the compact wire encoding
//! so any durable implementation can reuse [`RunRecord`] as-is.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::model::{Function, Run, RunRecord, Task};

/// Store of function versions, keyed by id.
#[async_trait]
pub trait FunctionStore: Send + Sync {
    /// Fetch a function version by id.
    async fn get(&self, id: Uuid) -> Result<Option<Function>>;

    /// Fetch a function by project, name, and version.
    async fn get_version(
        &self,
        project: &str,
        name: &str,
        version: &str,
    ) -> Result<Option<Function>>;

    /// Persist a new function version.
    async fn create(&self, function: Function) -> Result<()>;

    /// List functions of a project.
    async fn list(&self, project: &str) -> Result<Vec<Function>>;
}

/// Store of tasks, keyed by id.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Fetch a task by id.
    async fn get(&self, id: Uuid) -> Result<Option<Task>>;

    /// Persist a new task.
    async fn create(&self, task: Task) -> Result<()>;

    /// List tasks of a project.
    async fn list(&self, project: &str) -> Result<Vec<Task>>;
}

/// Store of runs, keyed by id.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Fetch a run by id.
    async fn get(&self, id: Uuid) -> Result<Option<Run>>;

    /// Persist a new run.
    async fn create(&self, run: Run) -> Result<()>;

    /// Replace an existing run.
    async fn update(&self, run: Run) -> Result<()>;

    /// Remove a run record entirely.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// List runs of a project, soft-deleted ones included.
    async fn list(&self, project: &str) -> Result<Vec<Run>>;
}

/// In-memory function store.
#[derive(Debug, Default)]
pub struct MemoryFunctionStore {
    inner: RwLock<HashMap<Uuid, Function>>,
}

impl MemoryFunctionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FunctionStore for MemoryFunctionStore {
    async fn get(&self, id: Uuid) -> Result<Option<Function>> {
        Ok(self.inner.read().await.get(&id).cloned())
    }

    async fn get_version(
        &self,
        project: &str,
        name: &str,
        version: &str,
    ) -> Result<Option<Function>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .find(|f| f.project == project && f.name == name && f.version == version)
            .cloned())
    }

    async fn create(&self, function: Function) -> Result<()> {
        self.inner.write().await.insert(function.id, function);
        Ok(())
    }

    async fn list(&self, project: &str) -> Result<Vec<Function>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|f| f.project == project)
            .cloned()
            .collect())
    }
}

/// In-memory task store.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    inner: RwLock<HashMap<Uuid, Task>>,
}

impl MemoryTaskStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn get(&self, id: Uuid) -> Result<Option<Task>> {
        Ok(self.inner.read().await.get(&id).cloned())
    }

    async fn create(&self, task: Task) -> Result<()> {
        self.inner.write().await.insert(task.id, task);
        Ok(())
    }

    async fn list(&self, project: &str) -> Result<Vec<Task>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|t| t.project == project)
            .cloned()
            .collect())
    }
}

/// In-memory run store.
///
/// Runs are held as encoded [`RunRecord`]s so every read and write exercises
/// the same wire shape a durable store would persist.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    inner: RwLock<HashMap<Uuid, RunRecord>>,
}

impl MemoryRunStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn get(&self, id: Uuid) -> Result<Option<Run>> {
        self.inner
            .read()
            .await
            .get(&id)
            .map(|record| record.decode())
            .transpose()
    }

    async fn create(&self, run: Run) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.contains_key(&run.id) {
            return Err(CoreError::Validation {
                field: "id".to_string(),
                message: format!("run '{}' already exists", run.id),
            });
        }
        inner.insert(run.id, RunRecord::encode(&run)?);
        Ok(())
    }

    async fn update(&self, run: Run) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.contains_key(&run.id) {
            return Err(CoreError::NotFound {
                entity: "run",
                id: run.id.to_string(),
            });
        }
        inner.insert(run.id, RunRecord::encode(&run)?);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.inner.write().await.remove(&id);
        Ok(())
    }

    async fn list(&self, project: &str) -> Result<Vec<Run>> {
        let inner = self.inner.read().await;
        let mut out = Vec::new();
        for record in inner.values() {
            if record.project == project {
                out.push(record.decode()?);
            }
        }
        Ok(out)
    }
}
