// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Docket Activity - Document Service Invocation
//!
//! The dispatcher never calls the document service directly. It goes
//! through an [`ActivityBackend`], which either calls a
//! [`DocumentService`](docket_core::DocumentService) in-process
//! ([`EmbeddedBackend`]) or posts the request to a remote docket server's
//! internal endpoint ([`HttpBackend`]).
//!
//! | Backend | Transport | Caller token |
//! |---------|-----------|--------------|
//! | [`EmbeddedBackend`] | direct call | ignored |
//! | [`HttpBackend`] | `POST /internal/v1/documents/execute` | `Authorization: Bearer` per call |
//!
//! Errors cross the remote boundary as the same
//! [`DocketError`](docket_core::DocketError) variant the document service
//! produced. A request that never left this process fails with
//! `RemoteCallFailed`, which is retriable. Once the request may have reached
//! the server, a transport failure is `RemoteOutcomeUnknown` and is never
//! retried. A backend makes at most one call per invocation; retries are the
//! dispatcher's business.

#![deny(missing_docs)]

/// Backend trait and implementations.
pub mod backend;

/// Request/response bodies of the internal document endpoint.
pub mod protocol;

pub use backend::embedded::EmbeddedBackend;
pub use backend::http::HttpBackend;
pub use backend::ActivityBackend;
pub use protocol::{ActivityRequest, ActivityResponse, EXECUTE_PATH};
