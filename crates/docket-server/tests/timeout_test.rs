// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Execution timeouts against the SQLite document service.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::*;
use docket_activity::{ActivityBackend, EmbeddedBackend};
use docket_core::{
    CallerIdentity, Command, CommandOutput, DocumentQuery, END_OF_PAGES, QueryOutput, Result,
};
use docket_dispatcher::ExecutionOptions;
use docket_server::router;

/// Document service that takes `delay` before touching the store.
struct SlowDocuments {
    inner: Arc<EmbeddedBackend>,
    delay: Duration,
}

#[async_trait]
impl ActivityBackend for SlowDocuments {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn invoke(&self, command: Command, caller_token: &str) -> Result<CommandOutput> {
        tokio::time::sleep(self.delay).await;
        self.inner.invoke(command, caller_token).await
    }

    async fn query(
        &self,
        query: DocumentQuery,
        caller: &CallerIdentity,
        caller_token: &str,
        request_id: &str,
    ) -> Result<QueryOutput> {
        self.inner
            .query(query, caller, caller_token, request_id)
            .await
    }
}

#[tokio::test]
async fn test_start_to_close_timeout_writes_nothing() {
    let execution = ExecutionOptions::default().start_to_close(Duration::from_millis(1));
    let state = state_around(execution, |documents| {
        Arc::new(SlowDocuments {
            inner: documents,
            delay: Duration::from_secs(10),
        })
    })
    .await;
    let app = router(state);

    let response = send(
        &app,
        Method::POST,
        "/v1/documents/invoice",
        Some(ALICE_TOKEN),
        Some(json!({
            "fields": {"note": "sample", "payable_amount": 200.0},
            "lines": [{"line_extension_amount": 200.0, "item_id": 7}]
        })),
    )
    .await;

    assert_eq!(response.status, StatusCode::GATEWAY_TIMEOUT, "{}", response.body);
    assert_eq!(response.body["code"], "EXECUTION_TIMED_OUT");
    assert_eq!(response.body["phase"], "start_to_close");
    assert_eq!(response.body["http_status"], 504);
    let execution_id = response.header("x-execution-id").unwrap().to_string();
    assert_eq!(response.body["execution_id"], execution_id.as_str());

    let execution = send(
        &app,
        Method::GET,
        &format!("/v1/executions/{}", execution_id),
        Some(ALICE_TOKEN),
        None,
    )
    .await;
    assert_eq!(execution.body["status"], "timed_out");
    assert_eq!(execution.body["attempt"], 1);

    let listing = send(
        &app,
        Method::GET,
        "/v1/documents/invoice",
        Some(ALICE_TOKEN),
        None,
    )
    .await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(listing.body["items"], json!([]));
    assert_eq!(listing.body["next_cursor"], END_OF_PAGES);
}

#[tokio::test]
async fn test_fast_enough_service_completes() {
    let execution = ExecutionOptions::default().start_to_close(Duration::from_secs(5));
    let state = state_around(execution, |documents| {
        Arc::new(SlowDocuments {
            inner: documents,
            delay: Duration::from_millis(20),
        })
    })
    .await;
    let app = router(state);

    let response = send(
        &app,
        Method::POST,
        "/v1/documents/invoice",
        Some(ALICE_TOKEN),
        Some(json!({"fields": {"note": "in time"}})),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);

    let listing = send(
        &app,
        Method::GET,
        "/v1/documents/invoice",
        Some(ALICE_TOKEN),
        None,
    )
    .await;
    assert_eq!(listing.body["items"].as_array().unwrap().len(), 1);
}
