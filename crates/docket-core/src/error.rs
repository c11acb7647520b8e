// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for docket.
//!
//! Every layer (document service, activity invocation, dispatcher, gateway)
//! shares this taxonomy so an error raised by the document service reaches
//! the HTTP caller unchanged. The enum is serde-tagged by its error code,
//! which lets the remote activity backend rebuild the exact variant the
//! document service produced.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type using DocketError
pub type Result<T> = std::result::Result<T, DocketError>;

/// Errors produced while executing document commands.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum DocketError {
    /// The acting user could not be resolved to an internal user ID.
    #[error("Failed to resolve actor for user '{user_id}': {reason}")]
    ActorResolutionFailed {
        /// The caller's external user ID.
        user_id: String,
        /// Why the lookup failed.
        reason: String,
    },

    /// A date field could not be parsed from its wire form.
    #[error("Invalid date in field '{field}': {reason}")]
    InvalidDateField {
        /// The offending field name.
        field: String,
        /// Parse error details.
        reason: String,
    },

    /// A payload field is unknown, missing or has the wrong type.
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField {
        /// The offending field name.
        field: String,
        /// Validation error details.
        reason: String,
    },

    /// An external identifier is not a canonical 36-character UUID.
    #[error("Invalid identifier '{value}'")]
    InvalidIdentifier {
        /// The rejected input.
        value: String,
    },

    /// A pagination cursor could not be decoded.
    #[error("Invalid cursor '{value}'")]
    InvalidCursor {
        /// The rejected input.
        value: String,
    },

    /// The addressed document does not exist (or is not active).
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Entity type name.
        entity: String,
        /// External ID that was looked up.
        id: String,
    },

    /// No descriptor is registered for the entity type.
    #[error("Unknown entity type '{entity}'")]
    UnknownEntity {
        /// The requested entity type.
        entity: String,
    },

    /// A write transaction failed and was rolled back in full.
    #[error("Transaction aborted: {reason}")]
    TransactionAborted {
        /// Underlying store error.
        reason: String,
        /// Whether the store reported a serialization conflict or deadlock.
        conflict: bool,
    },

    /// A non-transactional store operation failed.
    #[error("Database error during '{operation}': {details}")]
    Database {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// The execution did not reach a terminal state in time.
    #[error("Execution '{execution_id}' timed out after {timeout_ms}ms ({phase})")]
    ExecutionTimedOut {
        /// Execution identifier.
        execution_id: String,
        /// Which timeout fired (`schedule_to_start` or `start_to_close`).
        phase: String,
        /// The configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The caller lacks the permission required for the operation.
    #[error("Permission '{permission}' required")]
    PermissionDenied {
        /// The missing permission claim.
        permission: String,
    },

    /// The caller presented no valid credentials.
    #[error("Unauthenticated: {reason}")]
    Unauthenticated {
        /// Why authentication failed.
        reason: String,
    },

    /// No worker pool serves the requested queue.
    #[error("Unknown queue '{queue}'")]
    UnknownQueue {
        /// The requested queue name.
        queue: String,
    },

    /// The remote document service could not be reached.
    #[error("Remote call failed: {reason}")]
    RemoteCallFailed {
        /// Transport error details.
        reason: String,
    },

    /// The request reached the remote document service but no usable answer
    /// came back; the command may or may not have been applied.
    #[error("Remote outcome unknown: {reason}")]
    RemoteOutcomeUnknown {
        /// Transport error details.
        reason: String,
    },

    /// Unexpected internal failure.
    #[error("Internal error: {reason}")]
    Internal {
        /// Error details.
        reason: String,
    },
}

impl DocketError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ActorResolutionFailed { .. } => "ACTOR_RESOLUTION_FAILED",
            Self::InvalidDateField { .. } => "INVALID_DATE_FIELD",
            Self::InvalidField { .. } => "INVALID_FIELD",
            Self::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            Self::InvalidCursor { .. } => "INVALID_CURSOR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::UnknownEntity { .. } => "UNKNOWN_ENTITY",
            Self::TransactionAborted { .. } => "TRANSACTION_ABORTED",
            Self::Database { .. } => "DATABASE",
            Self::ExecutionTimedOut { .. } => "EXECUTION_TIMED_OUT",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::Unauthenticated { .. } => "UNAUTHENTICATED",
            Self::UnknownQueue { .. } => "UNKNOWN_QUEUE",
            Self::RemoteCallFailed { .. } => "REMOTE_CALL_FAILED",
            Self::RemoteOutcomeUnknown { .. } => "REMOTE_OUTCOME_UNKNOWN",
            Self::Internal { .. } => "INTERNAL",
        }
    }

    /// HTTP status the gateway reports for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidDateField { .. }
            | Self::InvalidField { .. }
            | Self::InvalidIdentifier { .. }
            | Self::InvalidCursor { .. } => 400,
            Self::Unauthenticated { .. } => 401,
            Self::PermissionDenied { .. } => 403,
            Self::NotFound { .. } | Self::UnknownEntity { .. } => 404,
            Self::TransactionAborted { conflict: true, .. } => 409,
            Self::ActorResolutionFailed { .. } => 424,
            Self::RemoteCallFailed { .. } | Self::RemoteOutcomeUnknown { .. } => 502,
            Self::ExecutionTimedOut { .. } => 504,
            Self::TransactionAborted { .. }
            | Self::Database { .. }
            | Self::UnknownQueue { .. }
            | Self::Internal { .. } => 500,
        }
    }

    /// Whether re-running the same execution may succeed.
    ///
    /// Business failures are never retriable; serialization conflicts,
    /// timeouts and calls that never reached the remote service are. A
    /// remote failure after the request was sent is not.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::TransactionAborted { conflict: true, .. }
                | Self::ExecutionTimedOut { .. }
                | Self::RemoteCallFailed { .. }
        )
    }

    /// Wrap a store error raised inside a write transaction.
    pub fn transaction(err: sqlx::Error) -> Self {
        let conflict = is_conflict(&err);
        Self::TransactionAborted {
            reason: err.to_string(),
            conflict,
        }
    }

    /// Wrap a store error raised by a plain read.
    pub fn database(operation: &str, err: sqlx::Error) -> Self {
        Self::Database {
            operation: operation.to_string(),
            details: err.to_string(),
        }
    }
}

/// Serialization failure / deadlock on PostgreSQL, busy / locked on SQLite.
fn is_conflict(err: &sqlx::Error) -> bool {
    let Some(code) = err.as_database_error().and_then(|db| db.code()) else {
        return matches!(err, sqlx::Error::PoolTimedOut);
    };
    matches!(code.as_ref(), "40001" | "40P01" | "5" | "6" | "517" | "262")
}

impl From<serde_json::Error> for DocketError {
    fn from(err: serde_json::Error) -> Self {
        DocketError::Internal {
            reason: format!("json: {}", err),
        }
    }
}
