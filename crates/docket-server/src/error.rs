// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! JSON error envelope.
//!
//! ```json
//! {
//!   "code": "NOT_FOUND",
//!   "entity": "invoice",
//!   "id": "2d3c1f0e-8a4b-4c5d-9e6f-7a8b9c0d1e2f",
//!   "message": "invoice '2d3c1f0e-...' not found",
//!   "http_status": 404,
//!   "request_id": "req-1"
//! }
//! ```
//!
//! The variant's own fields sit next to `code`, so a remote client can
//! rebuild the exact [`DocketError`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use docket_core::DocketError;
use serde::Serialize;

/// Handler error rendered as the JSON envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError(pub DocketError);

impl From<DocketError> for ApiError {
    fn from(error: DocketError) -> Self {
        Self(error)
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    error: &'a DocketError,
    message: String,
    http_status: u16,
    request_id: Option<&'a str>,
}

/// Render `error` as an envelope response.
pub fn envelope_response(error: &DocketError, request_id: Option<&str>) -> Response {
    let http_status = error.http_status();
    let status = StatusCode::from_u16(http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = Envelope {
        error,
        message: error.to_string(),
        http_status,
        request_id,
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    /// Renders without a request ID and leaves the error in the response
    /// extensions, where the request ID middleware picks it up to render
    /// the final envelope.
    fn into_response(self) -> Response {
        let mut response = envelope_response(&self.0, None);
        response.extensions_mut().insert(self);
        response
    }
}
