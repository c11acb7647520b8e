// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Retry policy for activity attempts.

use std::time::Duration;

use docket_core::DocketError;

/// Exponential-backoff retry policy.
///
/// Only retriable errors are retried. A start-to-close timeout is retriable
/// for the caller but never retried here: the timed-out attempt may still
/// commit, so a second attempt could apply the command twice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first. `1` disables retries.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` and default backoff.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Whether to run another attempt after `attempt` failed with `err`.
    pub fn should_retry(&self, attempt: u32, err: &DocketError) -> bool {
        attempt < self.max_attempts
            && err.is_retriable()
            && !matches!(err, DocketError::ExecutionTimedOut { .. })
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let delay = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict() -> DocketError {
        DocketError::TransactionAborted {
            reason: "could not serialize access".to_string(),
            conflict: true,
        }
    }

    #[test]
    fn test_default_policy_never_retries() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(1, &conflict()));
    }

    #[test]
    fn test_only_retriable_errors_are_retried() {
        let policy = RetryPolicy::with_max_attempts(3);
        assert!(policy.should_retry(1, &conflict()));
        assert!(policy.should_retry(2, &conflict()));
        assert!(!policy.should_retry(3, &conflict()));

        let invalid = DocketError::InvalidField {
            field: "note".to_string(),
            reason: "expected string".to_string(),
        };
        assert!(!policy.should_retry(1, &invalid));

        let timed_out = DocketError::ExecutionTimedOut {
            execution_id: "invoice_x".to_string(),
            phase: "start_to_close".to_string(),
            timeout_ms: 10,
        };
        assert!(!policy.should_retry(1, &timed_out));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            multiplier: 2.0,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(policy.backoff(9), Duration::from_millis(350));
    }

    #[test]
    fn test_zero_attempts_is_one() {
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts, 1);
    }
}
