// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for docket-core integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use docket_core::descriptor::ColumnSpec;
use docket_core::persistence::{DocumentStore, PostgresStore, SqliteStore};
use docket_core::{
    CallerIdentity, DocumentService, EntityCatalog, EntityDescriptor, StaticActorResolver,
};

/// Internal actor ID of [`alice`].
pub const ALICE_ID: i64 = 11;

/// Internal actor ID of [`bob`].
pub const BOB_ID: i64 = 12;

pub fn alice() -> CallerIdentity {
    CallerIdentity {
        user_id: "auth0|alice".to_string(),
        email: "alice@example.com".to_string(),
    }
}

pub fn bob() -> CallerIdentity {
    CallerIdentity {
        user_id: "auth0|bob".to_string(),
        email: "bob@example.com".to_string(),
    }
}

/// A caller the actor table does not know.
pub fn stranger() -> CallerIdentity {
    CallerIdentity {
        user_id: "auth0|mallory".to_string(),
        email: "mallory@example.com".to_string(),
    }
}

pub fn actors() -> Arc<StaticActorResolver> {
    Arc::new(
        StaticActorResolver::new()
            .with_actor("auth0|alice", ALICE_ID)
            .with_actor("auth0|bob", BOB_ID),
    )
}

/// Unwrap a `json!` object literal.
pub fn obj(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("expected a JSON object")
}

/// Document service over an in-memory SQLite store with the built-in catalog.
pub async fn sqlite_service() -> DocumentService {
    let store = SqliteStore::connect("sqlite::memory:", 1)
        .await
        .expect("Failed to create in-memory SQLite store");
    let service = DocumentService::new(
        Arc::new(store),
        Arc::new(EntityCatalog::builtin()),
        actors(),
    );
    service
        .ensure_schema()
        .await
        .expect("Failed to create schema");
    service
}

/// A memo descriptor backed by freshly named tables, so tests sharing one
/// PostgreSQL database do not see each other's rows.
pub fn isolated_memo() -> EntityDescriptor {
    let suffix = Uuid::new_v4().simple().to_string();
    EntityDescriptor::new("memo", &format!("memo_{}", suffix))
        .column(ColumnSpec::text("note").mutable())
        .column(ColumnSpec::decimal("amount").mutable())
        .column(ColumnSpec::date("issue_date"))
        .lines(
            &format!("memo_line_{}", suffix),
            vec![ColumnSpec::integer("item_id").required()],
        )
}

/// Document service over PostgreSQL at `TEST_DOCKET_DATABASE_URL`, with a
/// catalog holding only an [`isolated_memo`].
pub async fn postgres_service() -> Option<(DocumentService, Arc<PostgresStore>)> {
    let database_url = std::env::var("TEST_DOCKET_DATABASE_URL").ok()?;
    let store = Arc::new(PostgresStore::connect(&database_url, 10).await.ok()?);

    let mut catalog = EntityCatalog::new();
    catalog.register(isolated_memo()).ok()?;

    let dyn_store: Arc<dyn DocumentStore> = store.clone();
    let service = DocumentService::new(dyn_store, Arc::new(catalog), actors());
    service.ensure_schema().await.ok()?;
    Some((service, store))
}

/// Helper macro to skip tests if TEST_DOCKET_DATABASE_URL is not set.
#[macro_export]
macro_rules! skip_if_no_db {
    () => {
        if std::env::var("TEST_DOCKET_DATABASE_URL").is_err() {
            eprintln!("Skipping test: TEST_DOCKET_DATABASE_URL not set");
            return;
        }
    };
}
