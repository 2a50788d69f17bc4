// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory runnable store for embedding and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RunnableFilter, RunnableStore, StoreError};
use crate::runnable::Runnable;

/// Runnable store backed by a process-local map.
#[derive(Debug, Default)]
pub struct MemoryRunnableStore<R> {
    inner: RwLock<HashMap<Uuid, R>>,
}

impl<R> MemoryRunnableStore<R> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<R: Runnable> RunnableStore<R> for MemoryRunnableStore<R> {
    async fn get(&self, id: Uuid) -> Result<Option<R>, StoreError> {
        Ok(self.inner.read().await.get(&id).cloned())
    }

    async fn store(&self, runnable: &R) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .insert(runnable.id(), runnable.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.inner.write().await.remove(&id);
        Ok(())
    }

    async fn find_all(&self, filter: &RunnableFilter) -> Result<Vec<R>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|r| filter.matches(r.state(), r.project()))
            .cloned()
            .collect())
    }
}
