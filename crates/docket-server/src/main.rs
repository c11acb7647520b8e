// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Docket Server - durable document gateway
//!
//! Runs the HTTP gateway, the dispatcher worker pools and the local
//! document service against one SQL store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use docket_core::{
    ActorResolver, DocumentService, DocumentStore, EntityCatalog, HttpActorResolver,
    StaticActorResolver,
};
use docket_server::{AppState, Config, router, serve};

const DEFAULT_LOG_FILTER: &str =
    "docket_server=info,docket_dispatcher=info,docket_activity=info,docket_core=info,tower_http=info";

/// Timeout for user directory lookups.
const USER_DIRECTORY_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    info!("Starting Docket Server");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        http_addr = %config.http_addr,
        workers_per_queue = config.workers_per_queue,
        queue_capacity = config.queue_capacity,
        max_attempts = config.max_attempts,
        remote_documents = config.activity_endpoint.is_some(),
        "Configuration loaded"
    );

    // Connect to database
    info!("Connecting to database...");
    let store = docket_core::persistence::connect(&config.database_url, config.max_connections)
        .await?;
    info!(dialect = ?store.dialect(), "Database connection established");

    let actors: Arc<dyn ActorResolver> = match &config.user_directory_url {
        Some(url) => {
            info!(url = %url, "Resolving actors through the user directory");
            Arc::new(HttpActorResolver::new(url, USER_DIRECTORY_TIMEOUT)?)
        }
        None => Arc::new(StaticActorResolver::from(config.actors.clone())),
    };

    let service = DocumentService::new(store, Arc::new(EntityCatalog::builtin()), actors);
    service.ensure_schema().await?;

    let state = AppState::from_config(&config, service)?;
    let dispatcher = state.dispatcher.clone();

    info!("Docket Server initialized successfully");

    serve(config.http_addr, router(state), shutdown_signal()).await?;

    info!("Shutting down...");
    dispatcher.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
