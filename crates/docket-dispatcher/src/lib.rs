// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
#![deny(missing_docs)]
//! Durable command dispatcher for docket.
//!
//! Turns every mutation into an *execution*: a uniquely identified unit of
//! work that waits on a named queue, runs on a worker under bounded
//! timeouts, and reaches exactly one terminal state. The HTTP handler that
//! submitted it suspends until then.
//!
//! # Architecture
//!
//! ```text
//!   submit(prefix, queue, options, command, token)
//!        │
//!        │  registry: Scheduled
//!        ▼
//!   ┌──────────────────────────┐   bounded mpsc (capacity)
//!   │ queue "invoice"          │──────────────┬──────────────┐
//!   └──────────────────────────┘              ▼              ▼
//!                                        worker 0  ...  worker N-1
//!                                             │
//!                                             │  registry: Started
//!                                             ▼
//!                                  tokio::spawn(backend.invoke)
//!                                             │  timeout(start_to_close)
//!                                             ▼
//!                           Completed | TimedOut | Failed ──► oneshot reply
//! ```
//!
//! # Timeouts
//!
//! | Timeout | Covers | On elapse |
//! |---------|--------|-----------|
//! | schedule-to-start | waiting for queue capacity and for a worker | `ExecutionTimedOut`, activity never runs |
//! | start-to-close | one attempt of the activity | `ExecutionTimedOut`, activity keeps running detached |
//! | heartbeat | recorded on the execution | not enforced |
//!
//! A start-to-close timeout leaves the outcome unknown: the detached
//! activity may still commit. It is therefore never retried by the
//! dispatcher, even though callers may treat it as retriable.
//!
//! # Modules
//!
//! - [`dispatcher`] - builder, queues, worker pools, shutdown
//! - [`execution`] - execution IDs, options and lifecycle states
//! - [`registry`] - in-process status snapshots with retention
//! - [`retry`] - exponential-backoff retry policy

/// Builder, queues, worker pools and shutdown.
pub mod dispatcher;

/// Execution IDs, options and lifecycle states.
pub mod execution;

/// In-process execution registry.
pub mod registry;

/// Retry policy.
pub mod retry;

pub use dispatcher::{
    DEFAULT_CAPACITY, DEFAULT_WORKERS, Dispatcher, DispatcherBuilder, ExecutionHandle, QueueSpec,
};
pub use execution::{ExecutionOptions, ExecutionSnapshot, ExecutionStatus, new_execution_id};
pub use registry::{DEFAULT_RETENTION, ExecutionRegistry};
pub use retry::RetryPolicy;
