// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Executions: identity, timeouts and lifecycle state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default schedule-to-start timeout.
pub const DEFAULT_SCHEDULE_TO_START: Duration = Duration::from_secs(5);

/// Default start-to-close timeout.
pub const DEFAULT_START_TO_CLOSE: Duration = Duration::from_secs(30);

/// Default heartbeat timeout.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(10);

/// Generate an execution ID of the form `<prefix>_<32 hex digits>`.
pub fn new_execution_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Timeouts attached to one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Longest time an execution may wait, queue capacity included, before
    /// a worker picks it up.
    pub schedule_to_start: Duration,
    /// Longest time one attempt of the activity may run.
    pub start_to_close: Duration,
    /// Heartbeat interval. Recorded, not enforced: current activities are
    /// single synchronous calls.
    pub heartbeat: Duration,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            schedule_to_start: DEFAULT_SCHEDULE_TO_START,
            start_to_close: DEFAULT_START_TO_CLOSE,
            heartbeat: DEFAULT_HEARTBEAT,
        }
    }
}

impl ExecutionOptions {
    /// Override the schedule-to-start timeout.
    pub fn schedule_to_start(mut self, timeout: Duration) -> Self {
        self.schedule_to_start = timeout;
        self
    }

    /// Override the start-to-close timeout.
    pub fn start_to_close(mut self, timeout: Duration) -> Self {
        self.start_to_close = timeout;
        self
    }

    /// Override the heartbeat timeout.
    pub fn heartbeat(mut self, timeout: Duration) -> Self {
        self.heartbeat = timeout;
        self
    }
}

/// Lifecycle state of an execution.
///
/// ```text
/// Scheduled ──► Started ──► Completed
///     │            ├──────► TimedOut
///     │            └──────► Failed
///     └───────────────────► TimedOut (schedule-to-start)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Waiting for a worker.
    Scheduled,
    /// A worker is running the activity.
    Started,
    /// The activity returned successfully.
    Completed,
    /// A timeout fired; the outcome of a started activity is unknown.
    TimedOut,
    /// The activity returned an error.
    Failed,
}

impl ExecutionStatus {
    /// Terminal states are never left.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        match self {
            Self::Scheduled => matches!(next, Self::Started | Self::TimedOut | Self::Failed),
            Self::Started => next.is_terminal(),
            _ => false,
        }
    }
}

/// Point-in-time view of an execution, as served by `GET /v1/executions/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    /// Execution ID.
    pub execution_id: String,
    /// Queue the execution was submitted to.
    pub queue: String,
    /// Target entity type.
    pub entity: String,
    /// Command kind (`create` / `update`).
    pub kind: String,
    /// Correlation ID of the originating request.
    pub request_id: String,
    /// Current state.
    pub status: ExecutionStatus,
    /// Attempts started so far.
    pub attempt: u32,
    /// Schedule-to-start timeout in milliseconds.
    pub schedule_to_start_ms: u64,
    /// Start-to-close timeout in milliseconds.
    pub start_to_close_ms: u64,
    /// Heartbeat timeout in milliseconds.
    pub heartbeat_ms: u64,
    /// When the execution was submitted.
    pub scheduled_at: DateTime<Utc>,
    /// When a worker picked it up.
    pub started_at: Option<DateTime<Utc>>,
    /// When it reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Error code of a failed or timed-out execution.
    pub error_code: Option<String>,
    /// Error message of a failed or timed-out execution.
    pub error: Option<String>,
}
