// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for docket-dispatcher integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docket_activity::ActivityBackend;
use docket_core::{
    CallerIdentity, Command, CommandOutput, DocketError, DocumentQuery, QueryOutput, Result,
    UPDATED_SUCCESSFULLY,
};
use serde_json::Map;

/// Backend that sleeps, then replays scripted failures before succeeding.
#[derive(Default)]
pub struct StubBackend {
    delay: Duration,
    failures: Mutex<VecDeque<DocketError>>,
    /// Calls that entered `invoke`.
    pub calls: AtomicU32,
    /// Calls that ran to the end, success or failure.
    pub finished: AtomicU32,
    in_flight: AtomicU32,
    /// Highest number of concurrent calls observed.
    pub max_in_flight: AtomicU32,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_with(self, errors: Vec<DocketError>) -> Self {
        *self.failures.lock().unwrap() = errors.into();
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> u32 {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivityBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn invoke(&self, _command: Command, _caller_token: &str) -> Result<CommandOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(CommandOutput::Updated {
                message: UPDATED_SUCCESSFULLY.to_string(),
            }),
        }
    }

    async fn query(
        &self,
        _query: DocumentQuery,
        _caller: &CallerIdentity,
        _caller_token: &str,
        _request_id: &str,
    ) -> Result<QueryOutput> {
        Err(DocketError::Internal {
            reason: "queries are not dispatched".to_string(),
        })
    }
}

pub fn command(request_id: &str) -> Command {
    Command::update(
        request_id,
        CallerIdentity {
            user_id: "auth0|alice".to_string(),
            email: "alice@example.com".to_string(),
        },
        "invoice",
        "2d3c1f0e-8a4b-4c5d-9e6f-7a8b9c0d1e2f",
        Map::new(),
    )
}

pub fn conflict() -> DocketError {
    DocketError::TransactionAborted {
        reason: "could not serialize access due to concurrent update".to_string(),
        conflict: true,
    }
}
