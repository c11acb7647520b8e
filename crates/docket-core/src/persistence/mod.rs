// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for docket-core.
//!
//! Writes always run inside `run_in_transaction` at serializable isolation;
//! reads are plain queries. Each backend module exposes its own
//! `run_in_transaction` over its pool type.

#[macro_use]
mod sqlx_store;

pub mod postgres;
pub mod sql;
pub mod sqlite;

pub use self::postgres::PostgresStore;
pub use self::sql::Dialect;
pub use self::sqlite::SqliteStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::descriptor::{EntityDescriptor, TableSpec};
use crate::error::{DocketError, Result};
use crate::ids::ExternalId;
use crate::record::{DocumentRecord, FieldValue, NewRow};

/// Internal IDs generated by an aggregate insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedIds {
    /// Header row ID.
    pub header_id: i64,
    /// Line row IDs, in input order.
    pub line_ids: Vec<i64>,
}

/// Storage backend for documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// SQL dialect of this backend.
    fn dialect(&self) -> Dialect;

    /// Create the descriptor's tables if they do not exist.
    async fn ensure_schema(&self, descriptor: &EntityDescriptor) -> Result<()>;

    /// Insert a header and all its lines in one serializable transaction.
    ///
    /// The header's generated ID is written into every line's `header_id`.
    /// Any failure rolls back the header and every line already inserted.
    async fn insert_document(
        &self,
        descriptor: &EntityDescriptor,
        header: &NewRow,
        lines: &[NewRow],
    ) -> Result<InsertedIds>;

    /// Overwrite the mutable columns of the active header with `id`.
    ///
    /// Returns the number of rows affected.
    async fn update_header(
        &self,
        descriptor: &EntityDescriptor,
        id: &ExternalId,
        values: &[(String, FieldValue)],
        actor: i64,
        now: DateTime<Utc>,
    ) -> Result<u64>;

    /// Active header by external ID.
    async fn find_header(
        &self,
        descriptor: &EntityDescriptor,
        id: &ExternalId,
    ) -> Result<Option<DocumentRecord>>;

    /// Active header by internal ID.
    async fn find_header_by_internal_id(
        &self,
        descriptor: &EntityDescriptor,
        internal_id: i64,
    ) -> Result<Option<DocumentRecord>>;

    /// Active headers at or below `watermark`, descending, at most `limit`.
    async fn list_headers(
        &self,
        descriptor: &EntityDescriptor,
        watermark: Option<i64>,
        limit: i64,
    ) -> Result<Vec<DocumentRecord>>;

    /// Active lines of the header with internal ID `header_id`, ascending.
    async fn list_lines(
        &self,
        descriptor: &EntityDescriptor,
        header_id: i64,
    ) -> Result<Vec<DocumentRecord>>;
}

/// Open a store from a connection URL (`postgres://…` or `sqlite:…`).
pub async fn connect(database_url: &str, max_connections: u32) -> Result<Arc<dyn DocumentStore>> {
    if database_url.starts_with("sqlite:") {
        let store = SqliteStore::connect(database_url, max_connections).await?;
        Ok(Arc::new(store))
    } else {
        let store = PostgresStore::connect(database_url, max_connections).await?;
        Ok(Arc::new(store))
    }
}

pub(crate) fn line_spec(descriptor: &EntityDescriptor) -> Result<&TableSpec> {
    descriptor
        .lines
        .as_ref()
        .ok_or_else(|| DocketError::InvalidField {
            field: "lines".to_string(),
            reason: format!("'{}' has no line items", descriptor.name),
        })
}

impl FieldValue {
    pub(crate) fn text(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub(crate) fn integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub(crate) fn decimal(&self) -> Option<f64> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub(crate) fn boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub(crate) fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}
