// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
#![deny(missing_docs)]
//! HTTP gateway for docket.
//!
//! Authenticates callers, turns document mutations into durable executions
//! on the dispatcher, serves reads through the activity backend, and exposes
//! the local document service to remote gateways.
//!
//! # Request flow
//!
//! ```text
//!   HTTP request
//!        │  request_id_middleware (x-request-id, error envelope)
//!        │  TraceLayer
//!        │  auth_middleware (Bearer token → Principal)
//!        ▼
//!   handler ── <action>:<scope> check
//!        │
//!        ├── mutation ─► Dispatcher::schedule ─► worker ─► ActivityBackend::invoke
//!        └── read ─────────────────────────────────────► ActivityBackend::query
//! ```
//!
//! # Routes
//!
//! | Method | Path | Permission | Success |
//! |--------|------|------------|---------|
//! | GET | `/health` | none | 200 |
//! | POST | `/v1/documents/{entity}` | `create:<scope>` | 201 aggregate |
//! | PUT | `/v1/documents/{entity}/{id}` | `update:<scope>` | 200 `"Updated Successfully"` |
//! | GET | `/v1/documents/{entity}/{id}` | `read:<scope>` | 200 header (`?include_lines=true` for the aggregate) |
//! | GET | `/v1/documents/{entity}` | `read:<scope>` | 200 `{items, next_cursor}` |
//! | GET | `/v1/documents/{entity}/{id}/lines` | `read:<scope>` | 200 lines |
//! | GET | `/v1/executions/{id}` | authenticated | 200 snapshot |
//! | POST | `/internal/v1/documents/execute` | per command | 200 activity response |
//!
//! Mutation responses carry the execution ID in `x-execution-id`.

/// Bearer-token authentication and permission checks.
pub mod auth;

/// Configuration loading from environment variables.
pub mod config;

/// JSON error envelope.
pub mod error;

/// HTTP request handlers.
pub mod handlers;

/// Request ID propagation.
pub mod request_id;

/// Router, shared state and serving.
pub mod server;

pub use auth::{Authenticator, Principal, StaticTokenAuthenticator, TokenGrant, parse_token_table};
pub use config::{Config, ConfigError};
pub use error::ApiError;
pub use request_id::RequestId;
pub use server::{AppState, router, serve};
