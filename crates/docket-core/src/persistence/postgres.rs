// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL document store.

use futures::future::BoxFuture;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres};
use tracing::warn;

use crate::error::{DocketError, Result};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// PostgreSQL-backed document store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| DocketError::database("connect", e))?;
        Ok(Self { pool })
    }

    /// Underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Run `operation` inside a SERIALIZABLE transaction.
///
/// Commits when the operation succeeds. On failure the transaction is rolled
/// back and the operation's error is returned, unless the rollback itself
/// fails, in which case the rollback error wins.
pub async fn run_in_transaction<T, F>(pool: &PgPool, operation: F) -> Result<T>
where
    T: Send,
    F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T>> + Send,
{
    let mut tx = pool.begin().await.map_err(DocketError::transaction)?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await
        .map_err(DocketError::transaction)?;

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
    store: PostgresStore,
    dialect: Postgres,
    database: Postgres,
    query: PgQuery,
    connection: PgConnection,
    row: PgRow,
}
