//! Single-job lifecycle management.
//!
//! [`JobOrchestrator`] owns the state machine for one job at a time:
//! `Idle -> Submitting -> Polling -> {Succeeded, Failed, TimedOut}`.
//! Submission returns immediately; the provider calls run on a spawned
//! tokio task so the caller is never blocked between polls.
//!
//! All mutation of the state (submit, cancel, progress and completion from
//! the background task) goes through one mutex, and every background
//! write is tagged with the [`RunId`] it belongs to. A result that arrives
//! for a run that is no longer current is discarded, which is what keeps
//! the optional [`EditChain`] in completion order.
//!
//! Events are broadcast via a [`tokio::sync::broadcast`] channel. Call
//! [`JobOrchestrator::subscribe`] to receive them.
//!
//! Dropping the last handle cancels the active run. The background task
//! only holds the shared state, never a handle.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use kontext_core::request::JobOptions;
use kontext_core::{
    Artifact, CoreError, EditHistoryEntry, JobOutcome, JobRequest, JobState, PollConfig, RunId,
};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::chain::EditChain;
use crate::events::JobEvent;
use crate::poll::{poll_until_terminal, PollProgress};
use crate::transport::JobTransport;

/// Broadcast channel capacity for job events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Drives one job at a time against a [`JobTransport`].
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct JobOrchestrator {
    shared: Arc<Shared>,
    /// Cancels `Shared::root` once the last clone is gone.
    _owner: Arc<DropGuard>,
}

struct Shared {
    transport: Arc<dyn JobTransport>,
    config: PollConfig,
    event_tx: broadcast::Sender<JobEvent>,
    /// Parent of every run's token.
    root: CancellationToken,
    inner: Mutex<Inner>,
}

struct Inner {
    state: JobState,
    run: Option<RunSlot>,
    chain: Option<EditChain>,
}

/// Bookkeeping for the current (or most recent) run.
struct RunSlot {
    id: RunId,
    instruction: String,
    /// Submitted through [`JobOrchestrator::submit_edit`]; its result
    /// extends the edit chain.
    chained: bool,
    cancel: CancellationToken,
    task: Option<JoinHandle<Option<JobOutcome>>>,
}

impl JobOrchestrator {
    /// Create an orchestrator for plain generation jobs.
    pub fn new(transport: Arc<dyn JobTransport>, config: PollConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let root = CancellationToken::new();

        Ok(Self {
            _owner: Arc::new(root.clone().drop_guard()),
            shared: Arc::new(Shared {
                transport,
                config,
                event_tx,
                root,
                inner: Mutex::new(Inner {
                    state: JobState::Idle,
                    run: None,
                    chain: None,
                }),
            }),
        })
    }

    /// Create an orchestrator in chained-edit mode, starting from `base`.
    pub fn with_edit_chain(
        transport: Arc<dyn JobTransport>,
        config: PollConfig,
        base: Artifact,
    ) -> Result<Self, CoreError> {
        let orchestrator = Self::new(transport, config)?;
        orchestrator.shared.lock().chain = Some(EditChain::new(base));
        Ok(orchestrator)
    }

    /// Subscribe to progress and completion events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Snapshot of the current state. No side effects.
    pub fn current_state(&self) -> JobState {
        self.shared.lock().state.clone()
    }

    /// Polling bounds this orchestrator was built with.
    pub fn poll_config(&self) -> &PollConfig {
        &self.shared.config
    }

    /// Start a job. Rejected while another job is submitting or polling,
    /// or when called outside a tokio runtime; a rejected call leaves the
    /// state untouched.
    pub fn submit(&self, request: JobRequest) -> Result<RunId, SubmitRejected> {
        let inner = self.shared.lock();
        self.start(inner, request, false)
    }

    /// Start an edit of the chain's current artifact.
    ///
    /// When the job completes with `Ready`, the result is appended to the
    /// chain and becomes the input of the next edit.
    pub fn submit_edit(
        &self,
        instruction: impl Into<String>,
        options: JobOptions,
    ) -> Result<RunId, SubmitRejected> {
        let inner = self.shared.lock();
        let source = inner
            .chain
            .as_ref()
            .ok_or(SubmitRejected::NoEditChain)?
            .current_artifact()
            .clone();
        let request = JobRequest::edit(instruction, source).with_options(options);
        self.start(inner, request, true)
    }

    /// Cancel the active job, returning to `Idle`.
    ///
    /// Cooperative: the poll loop stops at its next check and any response
    /// still in flight is discarded. No completion event is sent for a
    /// cancelled run. Returns `false` (and does nothing) when no job is
    /// active.
    pub fn cancel(&self) -> bool {
        let mut inner = self.shared.lock();
        if !inner.state.is_active() {
            return false;
        }

        inner.state = JobState::Idle;
        let Some(run) = inner.run.as_mut() else {
            return true;
        };
        run.cancel.cancel();
        // Detach the task; it exits on its own at the next check.
        run.task = None;
        let run_id = run.id;
        drop(inner);

        tracing::info!(%run_id, "Job cancelled");
        let _ = self.shared.event_tx.send(JobEvent::Cancelled {
            run_id,
            at: Utc::now(),
        });
        true
    }

    /// Wait for the most recently submitted run to finish.
    ///
    /// Returns its outcome, or `None` if it was cancelled, superseded, or
    /// already waited on.
    pub async fn wait(&self) -> Option<JobOutcome> {
        let task = self
            .shared
            .lock()
            .run
            .as_mut()
            .and_then(|run| run.task.take())?;

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Job task ended abnormally");
                None
            }
        }
    }

    /// Cancel any active job. Equivalent to [`cancel`](Self::cancel) but
    /// named for use at process exit.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down job orchestrator");
        self.cancel();
    }

    // ---- edit chain ----

    /// Whether an edit chain is attached.
    pub fn has_edit_chain(&self) -> bool {
        self.shared.lock().chain.is_some()
    }

    /// Replace the chain's base artifact, clearing its history.
    ///
    /// Cancels any active job first so a late result can never land on
    /// the new chain. Attaches a chain if none exists yet.
    pub fn replace_base(&self, base: Artifact) {
        self.cancel();
        let mut inner = self.shared.lock();
        let chain = match inner.chain.take() {
            Some(mut chain) => {
                chain.reset(base);
                chain
            }
            None => EditChain::new(base),
        };
        inner.chain = Some(chain);
    }

    /// The artifact the next edit would start from.
    pub fn current_artifact(&self) -> Option<Artifact> {
        self.shared
            .lock()
            .chain
            .as_ref()
            .map(|chain| chain.current_artifact().clone())
    }

    /// Completed edits in completion order. Empty without a chain.
    pub fn history(&self) -> Vec<EditHistoryEntry> {
        self.shared
            .lock()
            .chain
            .as_ref()
            .map(|chain| chain.history().to_vec())
            .unwrap_or_default()
    }

    // ---- private helpers ----

    fn start(
        &self,
        mut inner: MutexGuard<'_, Inner>,
        request: JobRequest,
        chained: bool,
    ) -> Result<RunId, SubmitRejected> {
        if inner.state.is_active() {
            let run_id = inner
                .run
                .as_ref()
                .map(|run| run.id)
                .unwrap_or_default();
            tracing::warn!(%run_id, "Submit rejected: a job is already active");
            return Err(SubmitRejected::JobActive { run_id });
        }
        request.validate().map_err(SubmitRejected::Invalid)?;
        let runtime = Handle::try_current().map_err(|_| SubmitRejected::NoRuntime)?;

        let run_id = RunId::new();
        let cancel = self.shared.root.child_token();
        inner.state = JobState::Submitting;
        inner.run = Some(RunSlot {
            id: run_id,
            instruction: request.instruction().to_string(),
            chained,
            cancel: cancel.clone(),
            task: None,
        });

        tracing::info!(
            %run_id,
            edit = request.is_edit(),
            chained,
            "Submitting job",
        );

        let shared = Arc::clone(&self.shared);
        let task = runtime.spawn(async move { shared.drive(run_id, request, cancel).await });

        if let Some(run) = inner.run.as_mut() {
            run.task = Some(task);
        }
        Ok(run_id)
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // State stays consistent even if a holder panicked; every write
        // is a single assignment.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Background body of one run: submit, poll, complete.
    async fn drive(
        self: Arc<Self>,
        run_id: RunId,
        request: JobRequest,
        cancel: CancellationToken,
    ) -> Option<JobOutcome> {
        let handle = match self.transport.submit_job(&request).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(%run_id, error = %e, "Job submission failed");
                return self.complete(run_id, JobOutcome::Failed(e.to_string()));
            }
        };

        {
            let mut inner = self.lock();
            if !self.is_current(&inner, run_id) || cancel.is_cancelled() {
                tracing::debug!(%run_id, job_id = %handle.job_id, "Run superseded before polling");
                return None;
            }
            inner.state = JobState::Polling {
                handle: handle.clone(),
                attempt: 0,
                elapsed: std::time::Duration::ZERO,
            };
        }

        tracing::info!(%run_id, job_id = %handle.job_id, "Job accepted, polling");
        let _ = self.event_tx.send(JobEvent::Submitted {
            run_id,
            job_id: handle.job_id.clone(),
            at: Utc::now(),
        });

        let outcome = poll_until_terminal(
            self.transport.as_ref(),
            &handle,
            &self.config,
            &cancel,
            |progress| self.record_progress(run_id, progress),
        )
        .await?;

        self.complete(run_id, outcome)
    }

    fn record_progress(&self, run_id: RunId, progress: PollProgress) {
        {
            let mut inner = self.lock();
            if !self.is_current(&inner, run_id) {
                return;
            }
            if let JobState::Polling {
                attempt, elapsed, ..
            } = &mut inner.state
            {
                *attempt = progress.attempt;
                *elapsed = progress.elapsed;
            }
        }
        let _ = self.event_tx.send(JobEvent::Progress {
            run_id,
            attempt: progress.attempt,
            elapsed: progress.elapsed,
        });
    }

    /// Move the run to its terminal state and notify subscribers, unless
    /// it was cancelled or replaced in the meantime.
    fn complete(&self, run_id: RunId, outcome: JobOutcome) -> Option<JobOutcome> {
        {
            let mut inner = self.lock();
            if !self.is_current(&inner, run_id) {
                tracing::debug!(%run_id, "Discarding outcome of stale run");
                return None;
            }

            let chained_step = inner
                .run
                .as_ref()
                .filter(|run| run.chained)
                .map(|run| run.instruction.clone());
            if let (Some(instruction), JobOutcome::Ready(artifact)) = (chained_step, &outcome) {
                if let Some(chain) = inner.chain.as_mut() {
                    chain.record_success(instruction, artifact.clone());
                }
            }

            inner.state = JobState::from(outcome.clone());
        }

        tracing::info!(%run_id, outcome = ?outcome, "Job finished");
        let _ = self.event_tx.send(JobEvent::Completed {
            run_id,
            outcome: outcome.clone(),
            at: Utc::now(),
        });
        Some(outcome)
    }

    /// The run is still the orchestrator's active one.
    fn is_current(&self, inner: &Inner, run_id: RunId) -> bool {
        inner.state.is_active()
            && inner
                .run
                .as_ref()
                .is_some_and(|run| run.id == run_id && !run.cancel.is_cancelled())
    }
}

/// Reasons a submission was not started.
#[derive(Debug, thiserror::Error)]
pub enum SubmitRejected {
    /// Another job is still submitting or polling.
    #[error("Job {run_id} is still active")]
    JobActive { run_id: RunId },

    /// `submit_edit` was called without an edit chain attached.
    #[error("No edit chain: supply a base artifact first")]
    NoEditChain,

    /// The request itself is unusable.
    #[error(transparent)]
    Invalid(CoreError),

    /// `submit` was called outside a tokio runtime.
    #[error("No tokio runtime to run the job on")]
    NoRuntime,
}
