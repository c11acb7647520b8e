// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use docket_dispatcher::{ExecutionOptions, RetryPolicy};

use crate::auth::{TokenGrant, parse_token_table};

/// Docket server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL
    pub database_url: String,
    /// Connection pool size
    pub max_connections: u32,
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// Base URL of a remote document service; `None` runs it in-process
    pub activity_endpoint: Option<String>,
    /// Worker tasks per dispatcher queue
    pub workers_per_queue: usize,
    /// Bounded depth of each dispatcher queue
    pub queue_capacity: usize,
    /// Default timeouts for submitted executions
    pub execution: ExecutionOptions,
    /// Total attempts per execution
    pub max_attempts: u32,
    /// How long finished executions stay queryable
    pub execution_retention: Duration,
    /// Static bearer token table
    pub api_tokens: Vec<TokenGrant>,
    /// Static actor table (external user ID to internal ID)
    pub actors: HashMap<String, i64>,
    /// Base URL of the user directory; overrides `actors` when set
    pub user_directory_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `DOCKET_DATABASE_URL`: PostgreSQL or SQLite connection string
    ///
    /// Optional (with defaults):
    /// - `DOCKET_MAX_CONNECTIONS`: pool size (default: 10)
    /// - `DOCKET_HTTP_PORT`: gateway port (default: 8080)
    /// - `DOCKET_ACTIVITY_ENDPOINT`: remote document service (default: in-process)
    /// - `DOCKET_WORKERS_PER_QUEUE`: workers per queue (default: 4)
    /// - `DOCKET_QUEUE_CAPACITY`: queue depth (default: 64)
    /// - `DOCKET_SCHEDULE_TO_START_MS`: default: 5000
    /// - `DOCKET_START_TO_CLOSE_MS`: default: 30000
    /// - `DOCKET_HEARTBEAT_MS`: default: 10000
    /// - `DOCKET_MAX_ATTEMPTS`: default: 1
    /// - `DOCKET_EXECUTION_RETENTION_SECS`: default: 900
    /// - `DOCKET_API_TOKENS`: `token=user_id:email:perm1,perm2;...` (default: empty)
    /// - `DOCKET_ACTORS`: `user_id=internal_id;...` (default: empty)
    /// - `DOCKET_USER_DIRECTORY_URL`: HTTP actor resolver base URL
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DOCKET_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("DOCKET_DATABASE_URL"))?;

        let max_connections: u32 = positive("DOCKET_MAX_CONNECTIONS", 10)?;

        let http_port: u16 = parse_or("DOCKET_HTTP_PORT", 8080)
            .map_err(|_| ConfigError::Invalid("DOCKET_HTTP_PORT", "must be a valid port number"))?;

        let workers_per_queue: usize = positive("DOCKET_WORKERS_PER_QUEUE", 4)?;
        let queue_capacity: usize = positive("DOCKET_QUEUE_CAPACITY", 64)?;

        let execution = ExecutionOptions::default()
            .schedule_to_start(millis("DOCKET_SCHEDULE_TO_START_MS", 5_000)?)
            .start_to_close(millis("DOCKET_START_TO_CLOSE_MS", 30_000)?)
            .heartbeat(millis("DOCKET_HEARTBEAT_MS", 10_000)?);

        let max_attempts: u32 = positive("DOCKET_MAX_ATTEMPTS", 1)?;

        let retention_secs: u64 = parse_or("DOCKET_EXECUTION_RETENTION_SECS", 900).map_err(|_| {
            ConfigError::Invalid(
                "DOCKET_EXECUTION_RETENTION_SECS",
                "must be a non-negative integer",
            )
        })?;

        let api_tokens = parse_token_table(&optional("DOCKET_API_TOKENS").unwrap_or_default())
            .map_err(|reason| ConfigError::Invalid("DOCKET_API_TOKENS", reason))?;

        let actors = parse_actor_table(&optional("DOCKET_ACTORS").unwrap_or_default())
            .map_err(|reason| ConfigError::Invalid("DOCKET_ACTORS", reason))?;

        Ok(Self {
            database_url,
            max_connections,
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            activity_endpoint: optional("DOCKET_ACTIVITY_ENDPOINT"),
            workers_per_queue,
            queue_capacity,
            execution,
            max_attempts,
            execution_retention: Duration::from_secs(retention_secs),
            api_tokens,
            actors,
            user_directory_url: optional("DOCKET_USER_DIRECTORY_URL"),
        })
    }

    /// Retry policy derived from `max_attempts`.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.max_attempts)
    }
}

/// Parse `user_id=internal_id;user_id=internal_id`.
pub fn parse_actor_table(raw: &str) -> Result<HashMap<String, i64>, &'static str> {
    let mut actors = HashMap::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (user_id, internal_id) = entry
            .split_once('=')
            .ok_or("entries must look like user_id=internal_id")?;
        let internal_id = internal_id
            .trim()
            .parse::<i64>()
            .map_err(|_| "internal IDs must be integers")?;
        actors.insert(user_id.trim().to_string(), internal_id);
    }
    Ok(actors)
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, T::Err> {
    match optional(key) {
        Some(value) => value.parse(),
        None => Ok(default),
    }
}

fn positive<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    match parse_or(key, default) {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ConfigError::Invalid(key, "must be a positive integer")),
    }
}

fn millis(key: &'static str, default: u64) -> Result<Duration, ConfigError> {
    positive(key, default).map(Duration::from_millis)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
