// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP backend: the document service runs behind a remote docket server.

use std::time::Duration;

use async_trait::async_trait;
use docket_core::{
    CallerIdentity, Command, CommandOutput, DocketError, DocumentQuery, QueryOutput, Result,
};
use reqwest::StatusCode;
use tracing::{info, instrument, warn};

use super::ActivityBackend;
use crate::protocol::{ActivityRequest, ActivityResponse, EXECUTE_PATH};

/// Posts requests to `{base_url}/internal/v1/documents/execute`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBackend {
    /// Create a backend for the server at `base_url`.
    ///
    /// `timeout` bounds each HTTP call; the dispatcher's start-to-close
    /// timeout still applies on top of it.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DocketError::Internal {
                reason: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), EXECUTE_PATH),
        })
    }

    /// Full URL of the internal endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(
        &self,
        request: &ActivityRequest,
        caller_token: &str,
        request_id: &str,
    ) -> Result<ActivityResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(caller_token)
            .header("x-request-id", request_id)
            .json(request)
            .send()
            .await
            .map_err(|e| send_error(&self.endpoint, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| DocketError::RemoteOutcomeUnknown {
                reason: format!("failed to read response body: {}", e),
            })?;

        if status.is_success() {
            serde_json::from_slice(&body).map_err(|e| DocketError::RemoteOutcomeUnknown {
                reason: format!("invalid response body: {}", e),
            })
        } else {
            Err(decode_error(status, &body))
        }
    }
}

/// Classify a failed send.
///
/// Only failures before the request left this process are safe to repeat.
/// Once it may have reached the server (timeouts, resets, redirects), the
/// command may already be applied.
fn send_error(endpoint: &str, e: reqwest::Error) -> DocketError {
    let reason = format!("request to {} failed: {}", endpoint, e);
    if e.is_connect() || e.is_builder() {
        DocketError::RemoteCallFailed { reason }
    } else {
        DocketError::RemoteOutcomeUnknown { reason }
    }
}

/// Rebuild the error a remote server reported.
///
/// The error envelope carries the serialized error next to its `code`, so a
/// known code yields the same variant. Anything else leaves the outcome
/// unknown.
fn decode_error(status: StatusCode, body: &[u8]) -> DocketError {
    match serde_json::from_slice::<DocketError>(body) {
        Ok(err) => err,
        Err(_) => DocketError::RemoteOutcomeUnknown {
            reason: format!(
                "remote returned {}: {}",
                status,
                String::from_utf8_lossy(body)
            ),
        },
    }
}

fn unexpected(kind: &str) -> DocketError {
    DocketError::RemoteOutcomeUnknown {
        reason: format!("remote returned a {} response to the wrong operation", kind),
    }
}

#[async_trait]
impl ActivityBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    #[instrument(
        skip_all,
        fields(
            backend = "http",
            entity = %command.entity,
            user_id = %command.caller.user_id,
            request_id = %command.request_id,
        )
    )]
    async fn invoke(&self, command: Command, caller_token: &str) -> Result<CommandOutput> {
        info!(kind = command.action.kind(), "Invoking remote document command");
        let request_id = command.request_id.clone();
        let response = self
            .call(&ActivityRequest::Command { command }, caller_token, &request_id)
            .await;

        match response {
            Ok(ActivityResponse::Command { output }) => Ok(output),
            Ok(ActivityResponse::Query { .. }) => Err(unexpected("query")),
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "Remote document command failed");
                Err(e)
            }
        }
    }

    #[instrument(
        skip_all,
        fields(backend = "http", user_id = %caller.user_id, request_id = %request_id)
    )]
    async fn query(
        &self,
        query: DocumentQuery,
        caller: &CallerIdentity,
        caller_token: &str,
        request_id: &str,
    ) -> Result<QueryOutput> {
        info!("Invoking remote document query");
        let request = ActivityRequest::Query {
            request_id: request_id.to_string(),
            query,
        };
        match self.call(&request, caller_token, request_id).await? {
            ActivityResponse::Query { output } => Ok(output),
            ActivityResponse::Command { .. } => Err(unexpected("command")),
        }
    }
}
