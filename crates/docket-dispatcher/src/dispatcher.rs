// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Durable command dispatcher.
//!
//! # Example
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::builder()
//!     .backend(backend)
//!     .queue("invoice", 4, 64)
//!     .retry_policy(RetryPolicy::with_max_attempts(3))
//!     .start()?;
//!
//! let output = dispatcher
//!     .submit("invoice", "invoice", ExecutionOptions::default(), command, &token)
//!     .await?;
//!
//! dispatcher.shutdown().await;
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use docket_activity::ActivityBackend;
use docket_core::{Command, CommandOutput, DocketError, Result};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use crate::execution::{ExecutionOptions, ExecutionSnapshot, ExecutionStatus, new_execution_id};
use crate::registry::{DEFAULT_RETENTION, ExecutionRegistry};
use crate::retry::RetryPolicy;

/// Default number of workers per queue.
pub const DEFAULT_WORKERS: usize = 4;

/// Default bounded depth of a queue.
pub const DEFAULT_CAPACITY: usize = 64;

/// One unit of work handed from `submit` to a worker.
struct Job {
    execution_id: String,
    command: Command,
    caller_token: String,
    options: ExecutionOptions,
    enqueued_at: Instant,
    claim: Arc<Claim>,
    reply: oneshot::Sender<Result<CommandOutput>>,
}

/// Decides who owns a queued job: the worker that starts it, or the waiter
/// whose schedule-to-start deadline fired first. Taken at most once.
#[derive(Debug, Default)]
struct Claim(AtomicBool);

impl Claim {
    fn take(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }
}

/// Shape of one named queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    /// Queue name, usually the business domain (`invoice`).
    pub name: String,
    /// Long-running worker tasks serving the queue.
    pub workers: usize,
    /// Bounded channel depth.
    pub capacity: usize,
}

/// Builder for a [`Dispatcher`].
pub struct DispatcherBuilder {
    backend: Option<Arc<dyn ActivityBackend>>,
    queues: Vec<QueueSpec>,
    retry: RetryPolicy,
    retention: Duration,
}

impl std::fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("queues", &self.queues)
            .field("retry", &self.retry)
            .field("retention", &self.retention)
            .finish()
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            backend: None,
            queues: Vec::new(),
            retry: RetryPolicy::default(),
            retention: DEFAULT_RETENTION,
        }
    }
}

impl DispatcherBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the activity backend (required).
    pub fn backend(mut self, backend: Arc<dyn ActivityBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Add a named queue served by `workers` tasks with room for `capacity`
    /// waiting executions.
    pub fn queue(mut self, name: impl Into<String>, workers: usize, capacity: usize) -> Self {
        self.queues.push(QueueSpec {
            name: name.into(),
            workers,
            capacity,
        });
        self
    }

    /// Set the retry policy.
    ///
    /// Default: a single attempt.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set how long terminal executions stay queryable.
    ///
    /// Default: 15 minutes.
    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Spawn the worker pools.
    ///
    /// Must be called inside a tokio runtime. Fails when the backend is
    /// missing, no queue is configured, a queue name repeats, or a queue has
    /// zero workers or capacity.
    pub fn start(self) -> Result<Dispatcher> {
        let backend = self.backend.ok_or_else(|| invalid("backend is required"))?;
        if self.queues.is_empty() {
            return Err(invalid("at least one queue is required"));
        }

        let context = Arc::new(WorkerContext {
            backend,
            registry: Arc::new(ExecutionRegistry::new(self.retention)),
            retry: self.retry,
        });

        let senders = DashMap::new();
        let mut workers = Vec::new();
        let mut seen = HashSet::new();
        for spec in self.queues {
            if spec.workers == 0 || spec.capacity == 0 {
                return Err(invalid(&format!(
                    "queue '{}' needs at least one worker and one slot",
                    spec.name
                )));
            }
            if !seen.insert(spec.name.clone()) {
                return Err(invalid(&format!("queue '{}' is configured twice", spec.name)));
            }

            let (tx, rx) = mpsc::channel(spec.capacity);
            let rx = Arc::new(Mutex::new(rx));
            for worker in 0..spec.workers {
                workers.push(tokio::spawn(run_worker(
                    spec.name.clone(),
                    worker,
                    rx.clone(),
                    context.clone(),
                )));
            }
            info!(
                queue = %spec.name,
                workers = spec.workers,
                capacity = spec.capacity,
                backend = context.backend.name(),
                "Queue started"
            );
            senders.insert(spec.name, tx);
        }

        Ok(Dispatcher {
            inner: Arc::new(Inner {
                senders,
                context,
                workers: Mutex::new(workers),
                closed: AtomicBool::new(false),
            }),
        })
    }
}

fn invalid(reason: &str) -> DocketError {
    DocketError::Internal {
        reason: format!("invalid dispatcher configuration: {}", reason),
    }
}

struct WorkerContext {
    backend: Arc<dyn ActivityBackend>,
    registry: Arc<ExecutionRegistry>,
    retry: RetryPolicy,
}

struct Inner {
    senders: DashMap<String, mpsc::Sender<Job>>,
    context: Arc<WorkerContext>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

/// Runs commands as executions on named worker queues.
///
/// Cheap to clone; clones share the queues and the registry. Call
/// [`shutdown`](Self::shutdown) for graceful termination.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("queues", &self.queues())
            .field("backend", &self.inner.context.backend.name())
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl Dispatcher {
    /// Create a new builder for configuring the dispatcher.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Submit a command and wait for the execution to reach a terminal state.
    ///
    /// The execution ID is `<prefix>_<32 hex digits>`. Dropping the returned
    /// future abandons the wait but never cancels a started execution.
    pub async fn submit(
        &self,
        prefix: &str,
        queue: &str,
        options: ExecutionOptions,
        command: Command,
        caller_token: &str,
    ) -> Result<CommandOutput> {
        self.schedule(prefix, queue, options, command, caller_token)
            .await?
            .wait()
            .await
    }

    /// Enqueue a command and return a handle to its execution.
    ///
    /// Resolves once a queue slot was taken, or fails with
    /// `ExecutionTimedOut` when the queue stays full past schedule-to-start.
    #[instrument(
        skip_all,
        fields(
            queue = %queue,
            entity = %command.entity,
            request_id = %command.request_id,
            user_id = %command.caller.user_id,
            execution_id = tracing::field::Empty,
        )
    )]
    pub async fn schedule(
        &self,
        prefix: &str,
        queue: &str,
        options: ExecutionOptions,
        command: Command,
        caller_token: &str,
    ) -> Result<ExecutionHandle> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(DocketError::Internal {
                reason: "dispatcher is shut down".to_string(),
            });
        }
        let sender = self
            .inner
            .senders
            .get(queue)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DocketError::UnknownQueue {
                queue: queue.to_string(),
            })?;

        let execution_id = new_execution_id(prefix);
        tracing::Span::current().record("execution_id", execution_id.as_str());

        let registry = &self.inner.context.registry;
        registry.insert(ExecutionSnapshot {
            execution_id: execution_id.clone(),
            queue: queue.to_string(),
            entity: command.entity.clone(),
            kind: command.action.kind().to_string(),
            request_id: command.request_id.clone(),
            status: ExecutionStatus::Scheduled,
            attempt: 0,
            schedule_to_start_ms: millis(options.schedule_to_start),
            start_to_close_ms: millis(options.start_to_close),
            heartbeat_ms: millis(options.heartbeat),
            scheduled_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error_code: None,
            error: None,
        });

        let (reply, outcome) = oneshot::channel();
        let enqueued_at = Instant::now();
        let claim = Arc::new(Claim::default());
        let job = Job {
            execution_id: execution_id.clone(),
            command,
            caller_token: caller_token.to_string(),
            options,
            enqueued_at,
            claim: claim.clone(),
            reply,
        };

        let deadline = enqueued_at + options.schedule_to_start;
        match tokio::time::timeout_at(deadline, sender.send(job)).await {
            Ok(Ok(())) => debug!("Execution scheduled"),
            Ok(Err(_)) => {
                let err = DocketError::Internal {
                    reason: format!("queue '{}' is closed", queue),
                };
                registry.finish(&execution_id, ExecutionStatus::Failed, Some(&err));
                return Err(err);
            }
            Err(_) => {
                warn!("Queue full until schedule-to-start elapsed");
                let err = timed_out(&execution_id, "schedule_to_start", options.schedule_to_start);
                registry.finish(&execution_id, ExecutionStatus::TimedOut, Some(&err));
                return Err(err);
            }
        }

        Ok(ExecutionHandle {
            execution_id,
            outcome,
            claim,
            deadline,
            schedule_to_start: options.schedule_to_start,
            registry: registry.clone(),
        })
    }

    /// Status snapshot of an execution, if still retained.
    pub fn get_execution(&self, execution_id: &str) -> Option<ExecutionSnapshot> {
        self.inner.context.registry.get(execution_id)
    }

    /// Names of the configured queues, sorted.
    pub fn queues(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .senders
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Stop accepting submissions, let workers drain their queues and wait
    /// for them to exit.
    ///
    /// Activities already spawned by a timed-out attempt keep running on
    /// the runtime.
    pub async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Dispatcher shutting down...");
        self.inner.senders.clear();

        let handles = std::mem::take(&mut *self.inner.workers.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Dispatcher worker panicked: {}", e);
            }
        }
        info!("Dispatcher shutdown complete");
    }
}

/// A scheduled execution whose outcome has not been collected yet.
///
/// Dropping the handle does not cancel the execution.
#[derive(Debug)]
pub struct ExecutionHandle {
    execution_id: String,
    outcome: oneshot::Receiver<Result<CommandOutput>>,
    claim: Arc<Claim>,
    deadline: Instant,
    schedule_to_start: Duration,
    registry: Arc<ExecutionRegistry>,
}

impl ExecutionHandle {
    /// ID of the execution.
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Wait for the terminal state.
    ///
    /// Fails with `ExecutionTimedOut` as soon as schedule-to-start elapses
    /// without a worker starting the execution; the worker then skips it.
    pub async fn wait(self) -> Result<CommandOutput> {
        let Self {
            execution_id,
            mut outcome,
            claim,
            deadline,
            schedule_to_start,
            registry,
        } = self;

        tokio::select! {
            received = &mut outcome => return delivered(&execution_id, received),
            _ = tokio::time::sleep_until(deadline) => {}
        }

        if claim.take() {
            warn!(execution_id = %execution_id, "No worker started the execution before schedule-to-start");
            let err = timed_out(&execution_id, "schedule_to_start", schedule_to_start);
            registry.finish(&execution_id, ExecutionStatus::TimedOut, Some(&err));
            return Err(err);
        }
        delivered(&execution_id, outcome.await)
    }
}

fn delivered(
    execution_id: &str,
    received: std::result::Result<Result<CommandOutput>, oneshot::error::RecvError>,
) -> Result<CommandOutput> {
    received.unwrap_or_else(|_| {
        Err(DocketError::Internal {
            reason: format!("execution '{}' was dropped by its worker", execution_id),
        })
    })
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn timed_out(execution_id: &str, phase: &str, timeout: Duration) -> DocketError {
    DocketError::ExecutionTimedOut {
        execution_id: execution_id.to_string(),
        phase: phase.to_string(),
        timeout_ms: millis(timeout),
    }
}

/// Worker loop: pull jobs until every sender is gone.
async fn run_worker(
    queue: String,
    worker: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    context: Arc<WorkerContext>,
) {
    debug!(queue = %queue, worker, "Worker started");
    loop {
        let job = jobs.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };
        let span = info_span!(
            "execution",
            execution_id = %job.execution_id,
            queue = %queue,
            worker,
        );
        process(&context, job).instrument(span).await;
    }
    debug!(queue = %queue, worker, "Worker stopped");
}

async fn process(context: &WorkerContext, job: Job) {
    let Job {
        execution_id,
        command,
        caller_token,
        options,
        enqueued_at,
        claim,
        reply,
    } = job;
    let registry = &context.registry;

    if !claim.take() {
        debug!("Execution already timed out waiting for a worker");
        return;
    }
    if enqueued_at.elapsed() > options.schedule_to_start {
        warn!("Execution waited past schedule-to-start");
        let err = timed_out(&execution_id, "schedule_to_start", options.schedule_to_start);
        registry.finish(&execution_id, ExecutionStatus::TimedOut, Some(&err));
        let _ = reply.send(Err(err));
        return;
    }

    let mut attempt = 0;
    let result = loop {
        attempt += 1;
        registry.mark_started(&execution_id, attempt);
        info!(attempt, "Execution started");

        let outcome = run_attempt(context, &execution_id, &command, &caller_token, options).await;
        match outcome {
            Err(ref e) if context.retry.should_retry(attempt, e) => {
                let delay = context.retry.backoff(attempt);
                warn!(
                    attempt,
                    code = e.error_code(),
                    delay_ms = millis(delay),
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            other => break other,
        }
    };

    match &result {
        Ok(_) => {
            info!(attempt, "Execution completed");
            registry.finish(&execution_id, ExecutionStatus::Completed, None);
        }
        Err(e) if matches!(e, DocketError::ExecutionTimedOut { .. }) => {
            warn!(attempt, error = %e, "Execution timed out");
            registry.finish(&execution_id, ExecutionStatus::TimedOut, Some(e));
        }
        Err(e) => {
            warn!(attempt, code = e.error_code(), error = %e, "Execution failed");
            registry.finish(&execution_id, ExecutionStatus::Failed, Some(e));
        }
    }

    if reply.send(result).is_err() {
        debug!("Submitter went away before the execution finished");
    }
}

/// Run one attempt in its own task, bounded by start-to-close.
///
/// On timeout the task is detached, not aborted: an in-flight transaction
/// still commits or rolls back on its own.
async fn run_attempt(
    context: &WorkerContext,
    execution_id: &str,
    command: &Command,
    caller_token: &str,
    options: ExecutionOptions,
) -> Result<CommandOutput> {
    let backend = context.backend.clone();
    let command = command.clone();
    let caller_token = caller_token.to_string();
    let activity = tokio::spawn(async move { backend.invoke(command, &caller_token).await });

    match tokio::time::timeout(options.start_to_close, activity).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(DocketError::Internal {
            reason: format!("activity task failed: {}", e),
        }),
        Err(_) => Err(timed_out(execution_id, "start_to_close", options.start_to_close)),
    }
}
