// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite document store.
//!
//! SQLite serializes writers, so every transaction here already runs at
//! serializable isolation. Used for embedded deployments and tests.

use std::str::FromStr;
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::warn;

use crate::error::{DocketError, Result};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// SQLite-backed document store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`, creating the file if needed.
    ///
    /// In-memory databases are limited to one connection, since every
    /// connection would otherwise see its own empty database.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DocketError::database("connect", e))?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = database_url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new();
        if in_memory {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        } else {
            pool_options = pool_options.max_connections(max_connections);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| DocketError::database("connect", e))?;
        Ok(Self { pool })
    }

    /// Underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Run `operation` inside a transaction.
///
/// Commits when the operation succeeds. On failure the transaction is rolled
/// back and the operation's error is returned, unless the rollback itself
/// fails, in which case the rollback error wins.
pub async fn run_in_transaction<T, F>(pool: &SqlitePool, operation: F) -> Result<T>
where
    T: Send,
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T>> + Send,
{
    let mut tx = pool.begin().await.map_err(DocketError::transaction)?;

    match operation(&mut *tx).await {
        Ok(value) => {
            tx.commit().await.map_err(DocketError::transaction)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, original = %err, "Rollback failed");
                return Err(DocketError::transaction(rollback));
            }
            Err(err)
        }
    }
}

sqlx_document_store! {
    store: SqliteStore,
    dialect: Sqlite,
    database: Sqlite,
    query: SqliteQuery,
    connection: SqliteConnection,
    row: SqliteRow,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::descriptor::{ColumnSpec, EntityDescriptor};
    use crate::ids::ExternalId;
    use crate::persistence::DocumentStore;
    use crate::record::{Audit, FieldValue, NewRow};

    async fn test_store() -> SqliteStore {
        let store = SqliteStore::connect("sqlite::memory:", 1)
            .await
            .expect("Failed to create in-memory SQLite store");
        store
            .ensure_schema(&memo())
            .await
            .expect("Failed to create schema");
        store
    }

    fn memo() -> EntityDescriptor {
        EntityDescriptor::new("memo", "memos")
            .column(ColumnSpec::text("note").mutable())
            .column(ColumnSpec::decimal("amount").mutable())
            .column(ColumnSpec::boolean("urgent"))
            .column(ColumnSpec::date("due_date"))
            .lines("memo_lines", vec![ColumnSpec::integer("item_id")])
    }

    fn row(values: Vec<(&str, FieldValue)>) -> NewRow {
        NewRow {
            uuid: ExternalId::generate(),
            values: values
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            audit: Audit::created(7, Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let store = test_store().await;
        let descriptor = memo();
        let header = row(vec![
            ("note", FieldValue::Text("hello".to_string())),
            ("amount", FieldValue::Decimal(12.5)),
            ("urgent", FieldValue::Boolean(true)),
        ]);
        let lines = vec![
            row(vec![("item_id", FieldValue::Integer(1))]),
            row(vec![("item_id", FieldValue::Integer(2))]),
        ];

        let ids = store
            .insert_document(&descriptor, &header, &lines)
            .await
            .unwrap();
        assert_eq!(ids.line_ids.len(), 2);
        assert!(ids.line_ids[0] < ids.line_ids[1]);

        let found = store
            .find_header(&descriptor, &header.uuid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.internal_id, ids.header_id);
        assert_eq!(found.id, header.uuid);
        assert_eq!(found.field("note").unwrap(), "hello");
        assert_eq!(found.field("amount").unwrap(), 12.5);
        assert_eq!(found.field("urgent").unwrap(), true);
        assert!(found.field("due_date").unwrap().is_null());
        assert_eq!(found.created_by_user_id, 7);

        let stored_lines = store.list_lines(&descriptor, ids.header_id).await.unwrap();
        assert_eq!(stored_lines.len(), 2);
        assert_eq!(stored_lines[0].id, lines[0].uuid);
        assert_eq!(stored_lines[1].header_internal_id, Some(ids.header_id));
    }

    #[tokio::test]
    async fn test_failed_line_rolls_back_header() {
        let store = test_store().await;
        let descriptor = memo();
        let header = row(vec![("note", FieldValue::Text("doomed".to_string()))]);
        let first = row(vec![("item_id", FieldValue::Integer(1))]);
        let mut duplicate = row(vec![("item_id", FieldValue::Integer(2))]);
        duplicate.uuid = first.uuid;

        let err = store
            .insert_document(&descriptor, &header, &[first, duplicate])
            .await
            .unwrap_err();
        assert!(matches!(err, DocketError::TransactionAborted { .. }));

        assert!(store.find_header(&descriptor, &header.uuid).await.unwrap().is_none());
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memo_lines")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_run_in_transaction_returns_operation_error() {
        let store = test_store().await;
        let err = run_in_transaction(store.pool(), |conn| {
            Box::pin(async move {
                sqlx::query(
                    "INSERT INTO memos (uuid, status_code, created_by_user_id, updated_by_user_id, \
                     created_at, updated_at) VALUES (x'00000000000000000000000000000001', 'active', \
                     1, 1, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
                )
                .execute(&mut *conn)
                .await
                .map_err(DocketError::transaction)?;
                Err::<(), _>(DocketError::Internal {
                    reason: "stop".to_string(),
                })
            })
        })
        .await
        .unwrap_err();
        assert_eq!(
            err,
            DocketError::Internal {
                reason: "stop".to_string()
            }
        );

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memos")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_update_and_list_descending() {
        let store = test_store().await;
        let descriptor = memo();
        let mut uuids = Vec::new();
        for n in 0..3 {
            let header = row(vec![("amount", FieldValue::Decimal(n as f64))]);
            store.insert_document(&descriptor, &header, &[]).await.unwrap();
            uuids.push(header.uuid);
        }

        let affected = store
            .update_header(
                &descriptor,
                &uuids[0],
                &[("note".to_string(), FieldValue::Text("changed".to_string()))],
                9,
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let missing = store
            .update_header(&descriptor, &ExternalId::generate(), &[], 9, Utc::now())
            .await
            .unwrap();
        assert_eq!(missing, 0);

        let all = store.list_headers(&descriptor, None, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].internal_id > all[1].internal_id);
        let oldest = all.last().unwrap();
        assert_eq!(oldest.field("note").unwrap(), "changed");
        // omitted mutable column is overwritten
        assert!(oldest.field("amount").unwrap().is_null());
        assert_eq!(oldest.updated_by_user_id, 9);
        assert_eq!(oldest.created_by_user_id, 7);

        let below = store
            .list_headers(&descriptor, Some(all[1].internal_id), 10)
            .await
            .unwrap();
        assert_eq!(below.len(), 2);
        assert_eq!(below[0].internal_id, all[1].internal_id);
    }
}
