//! Shared fixtures: a scripted in-memory [`JobTransport`].

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kontext_core::{Artifact, JobHandle, JobRequest, PollConfig, PollResponse};
use kontext_orchestrator::{JobEvent, JobTransport, TransportError};
use tokio::sync::{broadcast, Notify};

/// Plays back scripted responses.
///
/// Submits succeed with handle `job-N` unless a submit error is queued.
/// Polls pop from the poll script and report `Pending` once it is empty.
#[derive(Default)]
pub struct ScriptedTransport {
    submit_errors: Mutex<VecDeque<TransportError>>,
    polls: Mutex<VecDeque<Result<PollResponse, TransportError>>>,
    submitted: Mutex<Vec<JobRequest>>,
    submit_count: AtomicU32,
    poll_count: AtomicU32,
    /// When set, every poll waits for a permit before answering.
    gate: Option<Arc<Notify>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_polls(responses: Vec<Result<PollResponse, TransportError>>) -> Self {
        let transport = Self::new();
        transport.push_polls(responses);
        transport
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn push_polls(&self, responses: Vec<Result<PollResponse, TransportError>>) {
        self.polls.lock().unwrap().extend(responses);
    }

    pub fn fail_next_submit(&self, error: TransportError) {
        self.submit_errors.lock().unwrap().push_back(error);
    }

    pub fn poll_count(&self) -> u32 {
        self.poll_count.load(Ordering::SeqCst)
    }

    pub fn submit_count(&self) -> u32 {
        self.submit_count.load(Ordering::SeqCst)
    }

    /// Requests received so far, in submission order.
    pub fn submitted(&self) -> Vec<JobRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobTransport for ScriptedTransport {
    async fn submit_job(&self, request: &JobRequest) -> Result<JobHandle, TransportError> {
        let n = self.submit_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.submitted.lock().unwrap().push(request.clone());
        if let Some(err) = self.submit_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(JobHandle::new(format!("job-{n}")))
    }

    async fn poll_job(&self, _handle: &JobHandle) -> Result<PollResponse, TransportError> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(PollResponse::Pending))
    }
}

pub fn url(s: &str) -> Artifact {
    Artifact::Url(s.to_string())
}

pub fn ready(s: &str) -> Result<PollResponse, TransportError> {
    Ok(PollResponse::Ready(url(s)))
}

pub fn pending() -> Result<PollResponse, TransportError> {
    Ok(PollResponse::Pending)
}

/// One-second interval, at most `max` attempts.
pub fn fast_config(max: u32) -> PollConfig {
    PollConfig::with_attempts(Duration::from_secs(1), max)
}

/// Drain every event currently buffered in `rx`.
pub fn drain(rx: &mut broadcast::Receiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Receive events until one matches `pred`, returning it.
pub async fn next_matching<F>(rx: &mut broadcast::Receiver<JobEvent>, mut pred: F) -> JobEvent
where
    F: FnMut(&JobEvent) -> bool,
{
    loop {
        let event = rx.recv().await.expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}

pub fn completed_count(events: &[JobEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, JobEvent::Completed { .. }))
        .count()
}
