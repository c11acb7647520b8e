// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use docket_activity::{ActivityBackend, EXECUTE_PATH, EmbeddedBackend, HttpBackend};
use docket_core::{DocumentService, EntityCatalog, Result};
use docket_dispatcher::{Dispatcher, ExecutionOptions};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{Authenticator, StaticTokenAuthenticator, auth_middleware};
use crate::config::Config;
use crate::handlers;
use crate::request_id::request_id_middleware;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Runs mutations as durable executions.
    pub dispatcher: Dispatcher,
    /// Serves reads; the same backend the dispatcher invokes.
    pub backend: Arc<dyn ActivityBackend>,
    /// The local document service, exposed on the internal endpoint.
    pub documents: Arc<EmbeddedBackend>,
    /// Document types, for queue and permission scope lookup.
    pub catalog: Arc<EntityCatalog>,
    /// Resolves bearer tokens.
    pub authenticator: Arc<dyn Authenticator>,
    /// Timeouts applied to every submitted execution.
    pub execution: ExecutionOptions,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("dispatcher", &self.dispatcher)
            .field("backend", &self.backend.name())
            .field("execution", &self.execution)
            .finish()
    }
}

impl AppState {
    /// Wire the gateway from configuration around a local document service.
    ///
    /// Mutations and reads use the remote document service when
    /// `activity_endpoint` is set, the local one otherwise. Starts one
    /// dispatcher queue per queue named in the catalog.
    pub fn from_config(config: &Config, service: DocumentService) -> Result<Self> {
        let catalog = Arc::new(service.catalog().clone());
        let documents = Arc::new(EmbeddedBackend::new(service));

        let backend: Arc<dyn ActivityBackend> = match &config.activity_endpoint {
            Some(endpoint) => {
                info!(endpoint = %endpoint, "Using remote document service");
                Arc::new(HttpBackend::new(endpoint, config.execution.start_to_close)?)
            }
            None => documents.clone(),
        };

        let mut builder = Dispatcher::builder()
            .backend(backend.clone())
            .retry_policy(config.retry_policy())
            .retention(config.execution_retention);
        for queue in catalog.queues() {
            builder = builder.queue(queue, config.workers_per_queue, config.queue_capacity);
        }
        let dispatcher = builder.start()?;

        Ok(Self {
            dispatcher,
            backend,
            documents,
            catalog,
            authenticator: Arc::new(StaticTokenAuthenticator::new(config.api_tokens.clone())),
            execution: config.execution,
        })
    }
}

/// Build the gateway router.
///
/// - `GET /health` (public)
/// - `POST /v1/documents/{entity}`, `GET /v1/documents/{entity}`
/// - `GET|PUT /v1/documents/{entity}/{id}`
/// - `GET /v1/documents/{entity}/{id}/lines`
/// - `GET /v1/executions/{id}`
/// - `POST /internal/v1/documents/execute`
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::health));

    let api_routes = Router::new()
        .route(
            "/v1/documents/{entity}",
            post(handlers::create_document).get(handlers::list_documents),
        )
        .route(
            "/v1/documents/{entity}/{id}",
            get(handlers::get_document).put(handlers::update_document),
        )
        .route(
            "/v1/documents/{entity}/{id}/lines",
            get(handlers::document_lines),
        )
        .route("/v1/executions/{id}", get(handlers::get_execution))
        .route(EXECUTE_PATH, post(handlers::execute_internal))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
}

/// Serve `router` on `addr` until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Gateway listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
