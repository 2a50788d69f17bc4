// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed runnable store.
//!
//! Each store instance owns one table, so every runnable type gets its own
//! retention policy. The schema is ensured when the store is opened; payloads
//! are stored in their MessagePack wire form.

use std::marker::PhantomData;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use super::{RunnableFilter, RunnableStore, StoreError};
use crate::runnable::{Runnable, from_wire, to_wire};
use crate::state::RunState;

/// Durable runnable store over a SQLite table.
pub struct SqliteRunnableStore<R> {
    pool: SqlitePool,
    table: String,
    _marker: PhantomData<fn() -> R>,
}

impl<R> std::fmt::Debug for SqliteRunnableStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRunnableStore")
            .field("table", &self.table)
            .finish()
    }
}

fn valid_table_name(table: &str) -> bool {
    !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl<R: Runnable> SqliteRunnableStore<R> {
    /// Create a store over an existing pool, ensuring the table exists.
    ///
    /// The table name must be lowercase `[a-z0-9_]+`; it is interpolated into
    /// DDL/DML and cannot be bound as a parameter.
    pub async fn new(pool: SqlitePool, table: &str) -> Result<Self, StoreError> {
        if !valid_table_name(table) {
            return Err(StoreError::Database {
                operation: "create_table",
                details: format!("invalid table name '{table}'"),
            });
        }

        let store = Self {
            pool,
            table: table.to_string(),
            _marker: PhantomData,
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create and initialize a store from a database file path.
    ///
    /// Creates parent directories and the database file if needed, then
    /// ensures the table exists.
    pub async fn from_path(path: impl AsRef<Path>, table: &str) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Database {
                operation: "create_dir",
                details: format!("failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| StoreError::Database {
                operation: "connect",
                details: format!("failed to connect to SQLite at {:?}: {}", path, e),
            })?;

        Self::new(pool, table).await
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                project TEXT NOT NULL,
                framework TEXT NOT NULL,
                state TEXT NOT NULL,
                payload BLOB NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database {
            operation: "create_table",
            details: e.to_string(),
        })?;

        Ok(())
    }

    fn decode_row(&self, payload: &[u8]) -> Result<R, StoreError> {
        from_wire(payload).map_err(|e| StoreError::Encoding(e.to_string()))
    }
}

#[async_trait]
impl<R: Runnable> RunnableStore<R> for SqliteRunnableStore<R> {
    async fn get(&self, id: Uuid) -> Result<Option<R>, StoreError> {
        let row = sqlx::query_as::<_, (Vec<u8>,)>(&format!(
            "SELECT payload FROM {} WHERE id = ?",
            self.table
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(payload,)| self.decode_row(&payload)).transpose()
    }

    async fn store(&self, runnable: &R) -> Result<(), StoreError> {
        let payload = to_wire(runnable).map_err(|e| StoreError::Encoding(e.to_string()))?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, project, framework, state, payload, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                state = excluded.state,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
            self.table
        ))
        .bind(runnable.id().to_string())
        .bind(runnable.project())
        .bind(runnable.framework())
        .bind(runnable.state().as_str())
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(&format!("DELETE FROM {} WHERE id = ?", self.table))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_all(&self, filter: &RunnableFilter) -> Result<Vec<R>, StoreError> {
        let rows: Vec<(String, Vec<u8>)> = if let Some(project) = &filter.project {
            sqlx::query_as(&format!(
                "SELECT state, payload FROM {} WHERE project = ?",
                self.table
            ))
            .bind(project)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as(&format!("SELECT state, payload FROM {}", self.table))
                .fetch_all(&self.pool)
                .await?
        };

        let mut out = Vec::new();
        for (state, payload) in rows {
            let Some(state) = RunState::parse(&state) else {
                return Err(StoreError::Encoding(format!("unknown state '{state}'")));
            };
            if let Some(states) = &filter.states
                && !states.contains(&state)
            {
                continue;
            }
            out.push(self.decode_row(&payload)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_validated() {
        assert!(valid_table_name("k8s_job_runnables"));
        assert!(valid_table_name("local_runnables2"));
        assert!(!valid_table_name(""));
        assert!(!valid_table_name("Runnables"));
        assert!(!valid_table_name("drop table;"));
    }
}
