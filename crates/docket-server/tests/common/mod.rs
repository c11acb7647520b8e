// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for docket-server integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use docket_core::persistence::SqliteStore;
use docket_core::{CallerIdentity, DocumentService, EntityCatalog, StaticActorResolver};
use docket_activity::{ActivityBackend, EmbeddedBackend};
use docket_dispatcher::{Dispatcher, ExecutionOptions};
use docket_server::{AppState, Config, StaticTokenAuthenticator, parse_token_table, router};

pub const ALICE_TOKEN: &str = "alice-token";
pub const READER_TOKEN: &str = "reader-token";
pub const GHOST_TOKEN: &str = "ghost-token";

/// Internal actor ID of alice.
pub const ALICE_ID: i64 = 11;

const TOKENS: &str = "alice-token=auth0|alice:alice@example.com:\
    create:invoices,update:invoices,read:invoices,create:tax_schemes,read:tax_schemes;\
    reader-token=auth0|reader:reader@example.com:read:invoices;\
    ghost-token=auth0|ghost:ghost@example.com:create:invoices";

pub fn config(activity_endpoint: Option<String>) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        max_connections: 1,
        http_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        activity_endpoint,
        workers_per_queue: 2,
        queue_capacity: 8,
        execution: ExecutionOptions::default(),
        max_attempts: 1,
        execution_retention: Duration::from_secs(60),
        api_tokens: parse_token_table(TOKENS).expect("valid token table"),
        actors: HashMap::from([
            ("auth0|alice".to_string(), ALICE_ID),
            ("auth0|reader".to_string(), 13),
        ]),
        user_directory_url: None,
    }
}

/// Document service over a fresh in-memory SQLite store.
pub async fn document_service(config: &Config) -> DocumentService {
    let store = SqliteStore::connect(&config.database_url, config.max_connections)
        .await
        .expect("Failed to create in-memory SQLite store");
    let service = DocumentService::new(
        Arc::new(store),
        Arc::new(EntityCatalog::builtin()),
        Arc::new(StaticActorResolver::from(config.actors.clone())),
    );
    service
        .ensure_schema()
        .await
        .expect("Failed to create schema");
    service
}

/// Gateway state over a fresh in-memory SQLite store.
pub async fn state_with(activity_endpoint: Option<String>) -> AppState {
    let config = config(activity_endpoint);
    let service = document_service(&config).await;
    AppState::from_config(&config, service).expect("Failed to build gateway state")
}

/// Gateway state whose dispatcher and reads go through `wrap(local service)`.
pub async fn state_around<F>(execution: ExecutionOptions, wrap: F) -> AppState
where
    F: FnOnce(Arc<EmbeddedBackend>) -> Arc<dyn ActivityBackend>,
{
    let config = config(None);
    let service = document_service(&config).await;
    let catalog = Arc::new(service.catalog().clone());
    let documents = Arc::new(EmbeddedBackend::new(service));
    let backend = wrap(documents.clone());

    let mut builder = Dispatcher::builder().backend(backend.clone());
    for queue in catalog.queues() {
        builder = builder.queue(queue, config.workers_per_queue, config.queue_capacity);
    }

    AppState {
        dispatcher: builder.start().expect("Failed to start dispatcher"),
        backend,
        documents,
        catalog,
        authenticator: Arc::new(StaticTokenAuthenticator::new(config.api_tokens)),
        execution,
    }
}

pub async fn app() -> Router {
    router(state_with(None).await)
}

/// Serve a gateway on an ephemeral port and return its base URL.
pub async fn spawn_server(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.ok();
    });
    format!("http://{}", addr)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn stranger() -> CallerIdentity {
    CallerIdentity {
        user_id: "auth0|mallory".to_string(),
        email: "mallory@example.com".to_string(),
    }
}
