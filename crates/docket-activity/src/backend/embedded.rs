// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embedded backend: the document service runs in the same process.

use async_trait::async_trait;
use docket_core::{
    CallerIdentity, Command, CommandOutput, DocumentQuery, DocumentService, QueryOutput, Result,
};
use tracing::{info, instrument, warn};

use super::ActivityBackend;

/// Calls a [`DocumentService`] directly.
#[derive(Clone)]
pub struct EmbeddedBackend {
    service: DocumentService,
}

impl EmbeddedBackend {
    /// Create a backend over `service`.
    pub fn new(service: DocumentService) -> Self {
        Self { service }
    }

    /// The wrapped service.
    pub fn service(&self) -> &DocumentService {
        &self.service
    }
}

#[async_trait]
impl ActivityBackend for EmbeddedBackend {
    fn name(&self) -> &'static str {
        "embedded"
    }

    #[instrument(
        skip_all,
        fields(
            backend = "embedded",
            entity = %command.entity,
            user_id = %command.caller.user_id,
            request_id = %command.request_id,
        )
    )]
    async fn invoke(&self, command: Command, _caller_token: &str) -> Result<CommandOutput> {
        info!(kind = command.action.kind(), "Invoking document command");
        let result = self.service.execute(command).await;
        if let Err(e) = &result {
            warn!(code = e.error_code(), error = %e, "Document command failed");
        }
        result
    }

    #[instrument(
        skip_all,
        fields(backend = "embedded", user_id = %caller.user_id, request_id = %request_id)
    )]
    async fn query(
        &self,
        query: DocumentQuery,
        caller: &CallerIdentity,
        _caller_token: &str,
        request_id: &str,
    ) -> Result<QueryOutput> {
        info!("Invoking document query");
        self.service.query(query).await
    }
}
