// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resolution of caller identities to internal user IDs.
//!
//! The document service stamps `created_by_user_id` / `updated_by_user_id`
//! with an internal numeric ID, while callers authenticate with an external
//! user ID. An [`ActorResolver`] bridges the two.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::command::CallerIdentity;
use crate::error::{DocketError, Result};

/// Maps an authenticated caller to the internal user ID used in audit columns.
#[async_trait]
pub trait ActorResolver: Send + Sync {
    /// Resolve `caller`. Failures surface as `ActorResolutionFailed`.
    async fn resolve_actor(&self, caller: &CallerIdentity, correlation_id: &str) -> Result<i64>;
}

/// Resolver backed by a fixed table, for development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticActorResolver {
    actors: HashMap<String, i64>,
}

impl StaticActorResolver {
    /// Empty table; every lookup fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user.
    pub fn with_actor(mut self, user_id: impl Into<String>, internal_id: i64) -> Self {
        self.actors.insert(user_id.into(), internal_id);
        self
    }
}

impl From<HashMap<String, i64>> for StaticActorResolver {
    fn from(actors: HashMap<String, i64>) -> Self {
        Self { actors }
    }
}

#[async_trait]
impl ActorResolver for StaticActorResolver {
    async fn resolve_actor(&self, caller: &CallerIdentity, _correlation_id: &str) -> Result<i64> {
        self.actors
            .get(&caller.user_id)
            .copied()
            .ok_or_else(|| DocketError::ActorResolutionFailed {
                user_id: caller.user_id.clone(),
                reason: "user is not registered".to_string(),
            })
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryUser {
    id: i64,
}

/// Resolver that asks a user directory service over HTTP.
///
/// Issues `GET {base}/users/{user_id}?email=…` and expects `{"id": <i64>}`.
#[derive(Debug, Clone)]
pub struct HttpActorResolver {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpActorResolver {
    /// Create a resolver for the directory at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| DocketError::Internal {
            reason: format!("invalid user directory URL '{}': {}", base_url, e),
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DocketError::Internal {
                reason: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client, base_url })
    }

    fn user_url(&self, user_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DocketError::Internal {
                reason: format!("user directory URL '{}' cannot be a base", self.base_url),
            })?
            .pop_if_empty()
            .push("users")
            .push(user_id);
        Ok(url)
    }
}

#[async_trait]
impl ActorResolver for HttpActorResolver {
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    async fn resolve_actor(&self, caller: &CallerIdentity, correlation_id: &str) -> Result<i64> {
        let failed = |reason: String| DocketError::ActorResolutionFailed {
            user_id: caller.user_id.clone(),
            reason,
        };

        let response = self
            .client
            .get(self.user_url(&caller.user_id)?)
            .query(&[("email", caller.email.as_str())])
            .header("x-request-id", correlation_id)
            .send()
            .await
            .map_err(|e| failed(format!("user directory request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("user directory returned {}", status)));
        }

        let user: DirectoryUser = response
            .json()
            .await
            .map_err(|e| failed(format!("invalid user directory response: {}", e)))?;
        debug!(internal_id = user.id, "Resolved actor");
        Ok(user.id)
    }
}
