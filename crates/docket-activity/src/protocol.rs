// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire bodies of the internal document endpoint.

use docket_core::{Command, CommandOutput, DocumentQuery, QueryOutput};
use serde::{Deserialize, Serialize};

/// Path of the internal document endpoint, relative to the server base URL.
pub const EXECUTE_PATH: &str = "/internal/v1/documents/execute";

/// Body posted to [`EXECUTE_PATH`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ActivityRequest {
    /// Run a mutation.
    Command {
        /// The command.
        command: Command,
    },
    /// Run a read.
    Query {
        /// Correlation ID.
        request_id: String,
        /// The query.
        query: DocumentQuery,
    },
}

/// Successful response from [`EXECUTE_PATH`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ActivityResponse {
    /// Result of a mutation.
    Command {
        /// The output.
        output: CommandOutput,
    },
    /// Result of a read.
    Query {
        /// The output.
        output: QueryOutput,
    },
}
