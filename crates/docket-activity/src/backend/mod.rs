// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Activity backends.
//!
//! - `embedded`: calls the document service in-process
//! - `http`: calls a remote docket server's internal endpoint

pub mod embedded;
pub mod http;

use async_trait::async_trait;
use docket_core::{CallerIdentity, Command, CommandOutput, DocumentQuery, QueryOutput, Result};

/// Invokes document service operations on behalf of a caller.
///
/// The caller's bearer token is passed to every call; backends never hold
/// an ambient credential of their own.
#[async_trait]
pub trait ActivityBackend: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Run a mutation.
    async fn invoke(&self, command: Command, caller_token: &str) -> Result<CommandOutput>;

    /// Run a read.
    async fn query(
        &self,
        query: DocumentQuery,
        caller: &CallerIdentity,
        caller_token: &str,
        request_id: &str,
    ) -> Result<QueryOutput>;
}
