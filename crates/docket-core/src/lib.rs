// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Docket Core - Document Service and Persistence Engine
//!
//! This crate owns everything below the activity boundary: the document
//! service that turns commands into rows, the transactional persistence
//! engine, the identity and pagination codec, and the error taxonomy shared
//! by every docket crate.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │   docket-server      │  HTTP ingress, bearer auth
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │  docket-dispatcher   │  named queues, executions, timeouts
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │   docket-activity    │  embedded or HTTP invocation
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │   docket-core        │  DocumentService → DocumentStore
//! │   (This Crate)       │
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │ PostgreSQL / SQLite  │
//! └──────────────────────┘
//! ```
//!
//! # Documents
//!
//! A document is a header row plus zero or more line rows, described by an
//! [`EntityDescriptor`]. Every row carries:
//!
//! | Column | Description |
//! |--------|-------------|
//! | `id` | Store-assigned internal ID, used only for ordering and paging |
//! | `uuid` | 16-byte external ID, generated before insert, never changes |
//! | `header_id` | Lines only: the owning header's internal ID |
//! | `status_code` | `active` rows are visible to reads and updates |
//! | `created_by_user_id`, `updated_by_user_id` | Internal actor IDs |
//! | `created_at`, `updated_at` | Audit timestamps |
//!
//! # Pagination
//!
//! Listings scan active headers by descending internal ID. The cursor
//! returned with each page is an opaque URL-safe token for "continue at or
//! below this ID"; the literal `"0"` means there is nothing left.
//!
//! # Modules
//!
//! - [`actor`]: Caller → internal user ID resolution
//! - [`command`]: Commands, queries and their outputs
//! - [`descriptor`]: Entity descriptors and the built-in catalog
//! - [`error`]: The shared error taxonomy
//! - [`fields`]: Payload validation and conversion
//! - [`ids`]: External IDs and cursors
//! - [`persistence`]: Document stores and `run_in_transaction`
//! - [`record`]: Row and response types
//! - [`service`]: The document service

#![deny(missing_docs)]

/// Resolution of authenticated callers to internal actor IDs.
pub mod actor;

/// Command, query and output payloads.
pub mod command;

/// Entity descriptors and the built-in document catalog.
pub mod descriptor;

/// Error taxonomy shared by every layer.
pub mod error;

/// Conversion of JSON payloads into typed column values.
pub mod fields;

/// External identifiers and pagination cursors.
pub mod ids;

/// Document stores (PostgreSQL, SQLite) and transactional helpers.
pub mod persistence;

/// Row and response types.
pub mod record;

/// Generic document service.
pub mod service;

pub use actor::{ActorResolver, HttpActorResolver, StaticActorResolver};
pub use command::{
    CallerIdentity, Command, CommandAction, CommandOutput, DocumentQuery, QueryOutput,
    UPDATED_SUCCESSFULLY,
};
pub use descriptor::{ColumnKind, ColumnSpec, EntityCatalog, EntityDescriptor, TableSpec};
pub use error::{DocketError, Result};
pub use ids::{END_OF_PAGES, ExternalId};
pub use persistence::{DocumentStore, PostgresStore, SqliteStore};
pub use record::{DocumentAggregate, DocumentRecord, Page};
pub use service::DocumentService;
