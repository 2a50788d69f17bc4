// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Corsa Core - Run Orchestration Engine
//!
//! This crate is the control plane that turns declared work into executions
//! on pluggable backends. Users declare a Function (what to run) and a Task
//! (how/where to run it); the core produces a Run, translates it into a
//! backend-specific Runnable, dispatches it asynchronously, and reconciles
//! backend status back into durable state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Thin Caller (API/CLI)                     │
//! │              create_run(task, overrides) / get_run(id)           │
//! └──────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  RunService ── Builder (resolve spec) ── persist Run (CREATED)   │
//! └──────────────────────────────────────────────────────────────────┘
//!                    │ async                          ▲
//!                    ▼                                │ transitions
//! ┌───────────────────────────┐          ┌────────────────────────────┐
//! │ Runner → Runnable (BUILT) │          │  RunLifecycle (per-run     │
//! │ publish runnable.changed  │          │  single-writer + log)      │
//! └───────────────────────────┘          └────────────────────────────┘
//!        │ event                                      ▲
//!        ▼                                            │
//! ┌───────────────────────────┐   execute   ┌─────────────────────────┐
//! │       Dispatch Loop       │────────────►│  Framework (k8s-job,    │
//! │  (worker pool + retries)  │             │  local, ...)            │
//! └───────────────────────────┘             └─────────────────────────┘
//!                                                     ▲
//! ┌───────────────────────────┐    status             │
//! │      Runnable Monitor     │───────────────────────┘
//! │  (edge-triggered polls)   │
//! └───────────────────────────┘
//! ```
//!
//! # Pipeline
//!
//! | Stage | Contract | Purity |
//! |-------|----------|--------|
//! | [`builder::Builder`] | function + task + template → resolved run spec | pure |
//! | [`runner::Runner`] | run → runnable | pure given the run's spec |
//! | [`framework::Framework`] | execute / stop / status | backend side effects |
//!
//! Backends register their spec factories in the [`spec::SpecRegistry`] and
//! their (builder, runner, framework, store) bundle in the
//! [`registry::BackendRegistry`] at process start. The core places no bound
//! on the number of registered backends.
//!
//! # Guarantees
//!
//! - **Lossless specs**: unknown spec fields round-trip through the
//!   extra-fields bag; `configure(to_map(x)) == x`.
//! - **Serialized transitions**: all state changes for one run pass through
//!   a per-run single-writer path; every accepted change appends an
//!   immutable transition record with a strictly increasing timestamp.
//! - **Terminal immutability**: `COMPLETED`, `ERROR`, `STOPPED`, `DELETED`
//!   accept no further events.
//! - **At-most-once execution**: the dispatch mark is persisted before the
//!   backend call, and recovery after a crash only ever probes status.
//! - **Fail closed**: an unknown framework never reaches a backend and ends
//!   the run in `ERROR`.
//!
//! # Modules
//!
//! - [`config`]: environment configuration
//! - [`spec`]: spec protocol and registry
//! - [`model`]: functions, tasks, runs, transitions
//! - [`state`]: lifecycle states and the transition table
//! - [`lifecycle`]: single-writer transition application
//! - [`builder`], [`runner`], [`framework`]: the backend pipeline contracts
//! - [`registry`]: backend registry and erased dispatch
//! - [`runnable`], [`store`]: runnable contract and durable stores
//! - [`repo`]: entity-store collaborator interfaces
//! - [`events`]: typed in-process event bus
//! - [`dispatch`], [`monitor`]: the asynchronous workers
//! - [`service`], [`runtime`]: caller surface and embeddable runtime

#![deny(missing_docs)]

/// Resolving run specs from function, task, and caller templates.
pub mod builder;

/// Environment configuration.
pub mod config;

/// The asynchronous dispatch loop.
pub mod dispatch;

/// Error types for the orchestration core.
pub mod error;

/// Typed in-process event bus.
pub mod events;

/// The pluggable backend executor contract.
pub mod framework;

/// Single-writer application of lifecycle transitions.
pub mod lifecycle;

/// Core entities: functions, tasks, runs, and their wire records.
pub mod model;

/// Backend status reconciliation.
pub mod monitor;

/// Backend registry and erased dispatch.
pub mod registry;

/// Entity-store collaborator interfaces.
pub mod repo;

/// The runnable contract and wire codec.
pub mod runnable;

/// Projecting runs into backend-facing runnables.
pub mod runner;

/// Embeddable orchestrator runtime.
pub mod runtime;

/// The run service: create, inspect, stop, delete.
pub mod service;

/// The spec protocol: typed-but-extensible configuration objects.
pub mod spec;

/// Run lifecycle states and the transition table.
pub mod state;

/// Durable keyed storage for runnables.
pub mod store;
