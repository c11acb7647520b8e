// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bearer-token authentication and permission checks.
//!
//! Every route except `/health` requires `Authorization: Bearer <token>`.
//! The token resolves to a [`Principal`]: the caller's identity plus a set
//! of `<action>:<scope>` permission claims such as `create:invoices`.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use docket_core::{CallerIdentity, DocketError, Result};
use tracing::debug;

use crate::error::ApiError;
use crate::server::AppState;

/// An authenticated caller.
#[derive(Clone)]
pub struct Principal {
    /// Who is calling.
    pub identity: CallerIdentity,
    /// Granted `<action>:<scope>` claims.
    pub permissions: BTreeSet<String>,
    /// The bearer token the caller presented, forwarded to activities.
    pub token: String,
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("identity", &self.identity)
            .field("permissions", &self.permissions)
            .field("token", &"[redacted]")
            .finish()
    }
}

impl Principal {
    /// Fail with `PermissionDenied` unless `<action>:<scope>` was granted.
    pub fn require(&self, action: &str, scope: &str) -> Result<()> {
        let permission = format!("{}:{}", action, scope);
        if self.permissions.contains(&permission) {
            Ok(())
        } else {
            Err(DocketError::PermissionDenied { permission })
        }
    }
}

/// Resolves bearer tokens to principals.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate `token`, failing with `Unauthenticated`.
    async fn authenticate(&self, token: &str) -> Result<Principal>;
}

/// One entry of the static token table.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// Bearer token.
    pub token: String,
    /// External user ID.
    pub user_id: String,
    /// User email.
    pub email: String,
    /// Granted permission claims.
    pub permissions: BTreeSet<String>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("token", &"[redacted]")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("permissions", &self.permissions)
            .finish()
    }
}

/// Parse a token table of the form
/// `token=user_id:email:perm1,perm2;token2=user_id:email:perm3`.
///
/// Empty entries are skipped; the permission list may be empty.
pub fn parse_token_table(raw: &str) -> std::result::Result<Vec<TokenGrant>, &'static str> {
    let mut grants = Vec::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (token, grant) = entry
            .split_once('=')
            .ok_or("entries must look like token=user_id:email:permissions")?;
        let mut parts = grant.splitn(3, ':');
        let user_id = parts.next().unwrap_or_default().trim();
        let email = parts.next().unwrap_or_default().trim();
        let permissions = parts.next().unwrap_or_default();

        let token = token.trim();
        if token.is_empty() || user_id.is_empty() || email.is_empty() {
            return Err("token, user_id and email must not be empty");
        }
        grants.push(TokenGrant {
            token: token.to_string(),
            user_id: user_id.to_string(),
            email: email.to_string(),
            permissions: permissions
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        });
    }
    Ok(grants)
}

/// Authenticator over a fixed token table.
#[derive(Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, TokenGrant>,
}

impl std::fmt::Debug for StaticTokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenAuthenticator")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl StaticTokenAuthenticator {
    /// Build from parsed grants. A repeated token keeps its last grant.
    pub fn new(grants: Vec<TokenGrant>) -> Self {
        Self {
            tokens: grants
                .into_iter()
                .map(|grant| (grant.token.clone(), grant))
                .collect(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Principal> {
        let grant = self
            .tokens
            .get(token)
            .ok_or_else(|| DocketError::Unauthenticated {
                reason: "unknown bearer token".to_string(),
            })?;
        Ok(Principal {
            identity: CallerIdentity {
                user_id: grant.user_id.clone(),
                email: grant.email.clone(),
            },
            permissions: grant.permissions.clone(),
            token: token.to_string(),
        })
    }
}

/// Middleware that resolves the bearer token and stores the [`Principal`]
/// in the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| DocketError::Unauthenticated {
            reason: "missing bearer token".to_string(),
        })?;

    let principal = state.authenticator.authenticate(token).await?;
    debug!(user_id = %principal.identity.user_id, "Caller authenticated");
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
