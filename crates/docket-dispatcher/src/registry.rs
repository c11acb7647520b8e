// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process execution registry.
//!
//! Executions are not persisted. The registry answers status queries while
//! the process lives and forgets terminal entries once the retention window
//! has passed.

use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use docket_core::DocketError;
use tracing::warn;

use crate::execution::{ExecutionSnapshot, ExecutionStatus};

/// Default retention for terminal executions.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(15 * 60);

struct Entry {
    snapshot: ExecutionSnapshot,
    finished: Option<Instant>,
}

/// Status snapshots keyed by execution ID.
pub struct ExecutionRegistry {
    entries: DashMap<String, Entry>,
    retention: Duration,
}

impl std::fmt::Debug for ExecutionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionRegistry")
            .field("entries", &self.entries.len())
            .field("retention", &self.retention)
            .finish()
    }
}

impl Default for ExecutionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl ExecutionRegistry {
    /// Create a registry keeping terminal entries for `retention`.
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            retention,
        }
    }

    /// Register a new execution, evicting expired terminal entries first.
    pub fn insert(&self, snapshot: ExecutionSnapshot) {
        self.evict_expired();
        let finished = snapshot.status.is_terminal().then(Instant::now);
        self.entries.insert(
            snapshot.execution_id.clone(),
            Entry { snapshot, finished },
        );
    }

    /// Record that a worker started `attempt`.
    pub fn mark_started(&self, execution_id: &str, attempt: u32) {
        if let Some(mut entry) = self.entries.get_mut(execution_id) {
            let snapshot = &mut entry.snapshot;
            if snapshot.status == ExecutionStatus::Scheduled {
                snapshot.status = ExecutionStatus::Started;
                snapshot.started_at = Some(Utc::now());
            }
            if snapshot.status == ExecutionStatus::Started {
                snapshot.attempt = attempt;
            }
        }
    }

    /// Move an execution to a terminal state.
    ///
    /// Illegal transitions are ignored; a terminal execution is never
    /// resumed or overwritten.
    pub fn finish(&self, execution_id: &str, status: ExecutionStatus, error: Option<&DocketError>) {
        let Some(mut entry) = self.entries.get_mut(execution_id) else {
            return;
        };
        if !entry.snapshot.status.can_transition_to(status) || !status.is_terminal() {
            warn!(
                execution_id = %execution_id,
                from = ?entry.snapshot.status,
                to = ?status,
                "Ignoring illegal execution transition"
            );
            return;
        }
        entry.snapshot.status = status;
        entry.snapshot.finished_at = Some(Utc::now());
        entry.snapshot.error_code = error.map(|e| e.error_code().to_string());
        entry.snapshot.error = error.map(|e| e.to_string());
        entry.finished = Some(Instant::now());
    }

    /// Current snapshot of an execution.
    pub fn get(&self, execution_id: &str) -> Option<ExecutionSnapshot> {
        self.entries
            .get(execution_id)
            .map(|entry| entry.snapshot.clone())
    }

    /// Number of tracked executions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no execution is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop terminal entries older than the retention window.
    pub fn evict_expired(&self) {
        let retention = self.retention;
        self.entries.retain(|_, entry| {
            entry
                .finished
                .is_none_or(|finished| finished.elapsed() < retention)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduled(id: &str) -> ExecutionSnapshot {
        ExecutionSnapshot {
            execution_id: id.to_string(),
            queue: "invoice".to_string(),
            entity: "invoice".to_string(),
            kind: "create".to_string(),
            request_id: "req-1".to_string(),
            status: ExecutionStatus::Scheduled,
            attempt: 0,
            schedule_to_start_ms: 5000,
            start_to_close_ms: 30000,
            heartbeat_ms: 10000,
            scheduled_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error_code: None,
            error: None,
        }
    }

    #[test]
    fn test_lifecycle() {
        let registry = ExecutionRegistry::default();
        registry.insert(scheduled("invoice_a"));

        registry.mark_started("invoice_a", 1);
        let snapshot = registry.get("invoice_a").unwrap();
        assert_eq!(snapshot.status, ExecutionStatus::Started);
        assert_eq!(snapshot.attempt, 1);
        assert!(snapshot.started_at.is_some());

        registry.mark_started("invoice_a", 2);
        registry.finish("invoice_a", ExecutionStatus::Completed, None);
        let snapshot = registry.get("invoice_a").unwrap();
        assert_eq!(snapshot.status, ExecutionStatus::Completed);
        assert_eq!(snapshot.attempt, 2);
        assert!(snapshot.finished_at.is_some());
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_terminal_state_is_final() {
        let registry = ExecutionRegistry::default();
        registry.insert(scheduled("invoice_b"));
        let err = DocketError::ExecutionTimedOut {
            execution_id: "invoice_b".to_string(),
            phase: "schedule_to_start".to_string(),
            timeout_ms: 5,
        };
        registry.finish("invoice_b", ExecutionStatus::TimedOut, Some(&err));

        registry.mark_started("invoice_b", 1);
        registry.finish("invoice_b", ExecutionStatus::Completed, None);

        let snapshot = registry.get("invoice_b").unwrap();
        assert_eq!(snapshot.status, ExecutionStatus::TimedOut);
        assert_eq!(snapshot.attempt, 0);
        assert_eq!(snapshot.error_code.as_deref(), Some("EXECUTION_TIMED_OUT"));
    }

    #[test]
    fn test_expired_terminal_entries_are_evicted() {
        let registry = ExecutionRegistry::new(Duration::ZERO);
        registry.insert(scheduled("invoice_done"));
        registry.insert(scheduled("invoice_running"));
        registry.mark_started("invoice_done", 1);
        registry.mark_started("invoice_running", 1);
        registry.finish("invoice_done", ExecutionStatus::Completed, None);

        registry.insert(scheduled("invoice_new"));

        assert!(registry.get("invoice_done").is_none());
        assert!(registry.get("invoice_running").is_some());
        assert!(registry.get("invoice_new").is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_execution_is_ignored() {
        let registry = ExecutionRegistry::default();
        registry.mark_started("missing", 1);
        registry.finish("missing", ExecutionStatus::Failed, None);
        assert!(registry.is_empty());
    }
}
