// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for corsa-core integration tests.
//!
//! Provides a mock backend (specs, builder, runner, framework) and a
//! TestContext wiring the full runtime over in-memory stores.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use corsa_core::builder::{Builder, compose_run_spec};
use corsa_core::config::Config;
use corsa_core::error::{CoreError, Result};
use corsa_core::framework::{Framework, FrameworkError};
use corsa_core::model::{Function, Run, Task};
use corsa_core::registry::BackendRegistry;
use corsa_core::repo::{
    FunctionStore, MemoryFunctionStore, MemoryRunStore, MemoryTaskStore, TaskStore,
};
use corsa_core::runnable::Runnable;
use corsa_core::runner::Runner;
use corsa_core::runtime::{OrchestratorRuntime, OrchestratorRuntimeBuilder};
use corsa_core::service::RunService;
use corsa_core::spec::registry::EntityType;
use corsa_core::spec::{ConfigurableSpec, SpecMap, SpecRegistry, put_opt, take_map, take_string};
use corsa_core::state::RunState;
use corsa_core::store::MemoryRunnableStore;

pub const MOCK_RUNTIME: &str = "mock";
pub const MOCK_FUNCTION_KIND: &str = "mock";
pub const MOCK_TASK_KIND: &str = "mock-job";

// ============================================================================
// Mock spec types
// ============================================================================

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MockFunctionSpec {
    pub image: Option<String>,
    pub extra: SpecMap,
}

impl ConfigurableSpec for MockFunctionSpec {
    fn configure(&mut self, data: &SpecMap) -> Result<()> {
        let mut data = data.clone();
        self.image = take_string(&mut data, "image");
        self.extra = data;
        Ok(())
    }

    fn to_map(&self) -> SpecMap {
        let mut out = self.extra.clone();
        put_opt(&mut out, "image", self.image.as_deref());
        out
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MockTaskSpec {
    pub function: Option<String>,
    pub extra: SpecMap,
}

impl ConfigurableSpec for MockTaskSpec {
    fn configure(&mut self, data: &SpecMap) -> Result<()> {
        let mut data = data.clone();
        self.function = take_string(&mut data, "function");
        self.extra = data;
        Ok(())
    }

    fn to_map(&self) -> SpecMap {
        let mut out = self.extra.clone();
        put_opt(&mut out, "function", self.function.as_deref());
        out
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MockRunSpec {
    pub task: SpecMap,
    pub function: SpecMap,
    pub extra: SpecMap,
}

impl ConfigurableSpec for MockRunSpec {
    fn configure(&mut self, data: &SpecMap) -> Result<()> {
        let mut data = data.clone();
        self.task = take_map(&mut data, "task").unwrap_or_default();
        self.function = take_map(&mut data, "function").unwrap_or_default();
        self.extra = data;
        Ok(())
    }

    fn to_map(&self) -> SpecMap {
        let mut out = self.extra.clone();
        if !self.task.is_empty() {
            out.insert("task".to_string(), serde_json::Value::Object(self.task.clone()));
        }
        if !self.function.is_empty() {
            out.insert(
                "function".to_string(),
                serde_json::Value::Object(self.function.clone()),
            );
        }
        out
    }
}

// ============================================================================
// Mock pipeline
// ============================================================================

pub struct MockBuilder;

impl Builder for MockBuilder {
    type Function = MockFunctionSpec;
    type Task = MockTaskSpec;
    type Run = MockRunSpec;

    fn build(
        &self,
        function: &Self::Function,
        task: &Self::Task,
        template: &Self::Run,
    ) -> Result<Self::Run> {
        let merged = compose_run_spec(function.to_map(), task.to_map(), template.to_map());
        let mut resolved = MockRunSpec::default();
        resolved.configure(&merged)?;
        Ok(resolved)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockRunnable {
    pub id: Uuid,
    pub project: String,
    pub state: RunState,
    pub error: Option<String>,
    pub message: Option<String>,
    pub image: Option<String>,
}

impl Runnable for MockRunnable {
    fn id(&self) -> Uuid {
        self.id
    }
    fn project(&self) -> &str {
        &self.project
    }
    fn framework(&self) -> &str {
        MOCK_TASK_KIND
    }
    fn state(&self) -> RunState {
        self.state
    }
    fn set_state(&mut self, state: RunState) {
        self.state = state;
    }
    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
    fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }
    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
    fn set_message(&mut self, message: Option<String>) {
        self.message = message;
    }
}

pub struct MockRunner;

impl Runner for MockRunner {
    type Output = MockRunnable;

    fn produce(&self, run: &Run) -> Result<MockRunnable> {
        let image = run
            .spec
            .get("function")
            .and_then(|v| v.as_object())
            .and_then(|f| f.get("image"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(MockRunnable {
            id: run.id,
            project: run.project.clone(),
            state: RunState::Created,
            error: None,
            message: None,
            image,
        })
    }
}

// ============================================================================
// Mock framework
// ============================================================================

/// Knobs and counters shared between a test and its mock framework.
#[derive(Default)]
pub struct MockBehavior {
    pub executes: AtomicUsize,
    pub stops: AtomicUsize,
    pub status_calls: AtomicUsize,
    /// The first N executes fail with a transient error.
    pub fail_executes: AtomicUsize,
    /// Every execute fails with a fatal rejection.
    pub reject_execute: AtomicBool,
    /// Status probes hang until the caller's timeout fires.
    pub hang_status: AtomicBool,
    /// Status probes fail with a transient error.
    pub fail_status: AtomicBool,
    /// Backend-side state per runnable; absent means "as stored".
    backend_states: Mutex<HashMap<Uuid, RunState>>,
}

impl MockBehavior {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set the state the backend will report for a runnable.
    pub async fn set_backend_state(&self, id: Uuid, state: RunState) {
        self.backend_states.lock().await.insert(id, state);
    }

    pub fn executes(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

pub struct MockFramework {
    pub behavior: Arc<MockBehavior>,
}

#[async_trait]
impl Framework for MockFramework {
    type Runnable = MockRunnable;

    fn name(&self) -> &'static str {
        MOCK_TASK_KIND
    }

    async fn execute(&self, runnable: &mut MockRunnable) -> std::result::Result<(), FrameworkError> {
        self.behavior.executes.fetch_add(1, Ordering::SeqCst);

        if self.behavior.reject_execute.load(Ordering::SeqCst) {
            return Err(FrameworkError::Rejected("manifest rejected".to_string()));
        }

        let remaining = self.behavior.fail_executes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.behavior.fail_executes.store(remaining - 1, Ordering::SeqCst);
            return Err(FrameworkError::Transient("connection refused".to_string()));
        }

        runnable.set_message(Some(format!("submitted as mock-{}", runnable.id)));
        Ok(())
    }

    async fn stop(&self, runnable: &mut MockRunnable) -> std::result::Result<(), FrameworkError> {
        self.behavior.stops.fetch_add(1, Ordering::SeqCst);
        self.behavior
            .set_backend_state(runnable.id, RunState::Stopped)
            .await;
        Ok(())
    }

    async fn status(&self, runnable: &MockRunnable) -> std::result::Result<RunState, FrameworkError> {
        self.behavior.status_calls.fetch_add(1, Ordering::SeqCst);

        if self.behavior.hang_status.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.behavior.fail_status.load(Ordering::SeqCst) {
            return Err(FrameworkError::Transient("backend unreachable".to_string()));
        }

        let states = self.behavior.backend_states.lock().await;
        Ok(states.get(&runnable.id).copied().unwrap_or(runnable.state))
    }
}

// ============================================================================
// TestContext
// ============================================================================

/// Register the mock backend's specs and bundle.
pub fn register_mock_backend(
    specs: &Arc<SpecRegistry>,
    backends: &BackendRegistry,
    behavior: Arc<MockBehavior>,
    store: Arc<MemoryRunnableStore<MockRunnable>>,
) {
    specs.register(
        MOCK_RUNTIME,
        MOCK_FUNCTION_KIND,
        EntityType::Function,
        MockFunctionSpec::default,
    );
    specs.register(
        MOCK_RUNTIME,
        MOCK_TASK_KIND,
        EntityType::Task,
        MockTaskSpec::default,
    );
    specs.register(
        MOCK_RUNTIME,
        MOCK_TASK_KIND,
        EntityType::Run,
        MockRunSpec::default,
    );

    backends.register(
        MOCK_RUNTIME,
        specs.clone(),
        MockBuilder,
        MockRunner,
        MockFramework { behavior },
        store,
    );
}

/// Test context over in-memory stores and a fast-polling runtime.
pub struct TestContext {
    pub runtime: OrchestratorRuntime,
    pub behavior: Arc<MockBehavior>,
    pub functions: Arc<MemoryFunctionStore>,
    pub tasks: Arc<MemoryTaskStore>,
    pub runs: Arc<MemoryRunStore>,
    pub runnables: Arc<MemoryRunnableStore<MockRunnable>>,
}

/// Install a log subscriber for test debugging; honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl TestContext {
    pub async fn new() -> Self {
        init_tracing();
        let specs = Arc::new(SpecRegistry::new());
        let backends = Arc::new(BackendRegistry::new());
        let behavior = MockBehavior::new();
        let runnables = Arc::new(MemoryRunnableStore::new());

        register_mock_backend(&specs, &backends, behavior.clone(), runnables.clone());

        let functions = Arc::new(MemoryFunctionStore::new());
        let tasks = Arc::new(MemoryTaskStore::new());
        let runs = Arc::new(MemoryRunStore::new());

        let config = Config {
            dispatch_workers: 4,
            max_retries: 2,
            backoff: Duration::from_millis(10),
            call_timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(25),
            database_path: None,
        };

        let runtime = runtime_builder(
            specs,
            backends,
            functions.clone(),
            tasks.clone(),
            runs.clone(),
            config,
        )
        .build()
        .expect("runtime config")
        .start()
        .await
        .expect("runtime start");

        Self {
            runtime,
            behavior,
            functions,
            tasks,
            runs,
            runnables,
        }
    }

    pub fn service(&self) -> &Arc<RunService> {
        self.runtime.service()
    }

    /// Seed a function and a task targeting it; returns the task id.
    pub async fn seed_entities(&self) -> Uuid {
        seed_entities(self.functions.as_ref(), self.tasks.as_ref()).await
    }

    /// Poll until the run reaches `state` or the timeout elapses.
    pub async fn wait_for_state(&self, run_id: Uuid, state: RunState) -> bool {
        wait_for_state(self.service(), run_id, state, Duration::from_secs(5)).await
    }
}

pub fn runtime_builder(
    specs: Arc<SpecRegistry>,
    backends: Arc<BackendRegistry>,
    functions: Arc<MemoryFunctionStore>,
    tasks: Arc<MemoryTaskStore>,
    runs: Arc<MemoryRunStore>,
    config: Config,
) -> OrchestratorRuntimeBuilder {
    OrchestratorRuntime::builder()
        .spec_registry(specs)
        .backend_registry(backends)
        .function_store(functions)
        .task_store(tasks)
        .run_store(runs)
        .config(config)
}

/// Seed a mock function and task into arbitrary stores; returns the task id.
pub async fn seed_entities(functions: &dyn FunctionStore, tasks: &dyn TaskStore) -> Uuid {
    let function = Function {
        id: Uuid::new_v4(),
        project: "proj".to_string(),
        name: "fn".to_string(),
        kind: MOCK_FUNCTION_KIND.to_string(),
        version: "v1".to_string(),
        spec: spec_map(serde_json::json!({"image": "x"})),
        created: Utc::now(),
    };
    functions.create(function).await.expect("create function");

    let task = Task {
        id: Uuid::new_v4(),
        project: "proj".to_string(),
        kind: MOCK_TASK_KIND.to_string(),
        function: "fn".to_string(),
        function_version: "v1".to_string(),
        spec: spec_map(serde_json::json!({"function": "f"})),
        created: Utc::now(),
    };
    let task_id = task.id;
    tasks.create(task).await.expect("create task");
    task_id
}

/// Poll a service until the run reaches `state` or the timeout elapses.
pub async fn wait_for_state(
    service: &RunService,
    run_id: Uuid,
    state: RunState,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match service.get_run(run_id).await {
            Ok(snapshot) if snapshot.state == state => return true,
            Ok(_) | Err(CoreError::NotFound { .. }) => {}
            Err(e) => panic!("get_run failed: {e}"),
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Build a SpecMap from a JSON object literal.
pub fn spec_map(value: serde_json::Value) -> SpecMap {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("expected a JSON object"),
    }
}
