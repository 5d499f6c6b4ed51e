//! Fixed-interval polling of a submitted job.
//!
//! [`poll_until_terminal`] turns a [`JobHandle`] into a terminal
//! [`JobOutcome`]. The attempt and wall-clock budgets from [`PollConfig`]
//! are checked on every iteration, so a time-out is a local decision
//! rather than a racing timer. Each poll call is also bounded by
//! [`PollConfig::call_budget`], so a transport that never answers still
//! ends in a time-out. Cancellation is cooperative: the token is
//! checked at the top of each iteration and during the interval sleep,
//! and a poll call that was already in flight is allowed to finish but
//! its result is thrown away.

use std::time::Duration;

use kontext_core::{JobHandle, JobOutcome, PollConfig, PollResponse};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::transport::JobTransport;

/// Snapshot reported after every non-terminal poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollProgress {
    /// 1-based number of the poll that just returned `Pending`.
    pub attempt: u32,
    /// Time since polling began.
    pub elapsed: Duration,
}

/// Poll `handle` until the provider reports a terminal status, the budget
/// in `config` runs out, or `cancel` fires.
///
/// Returns `None` only when cancelled. Transport errors end the loop
/// immediately as [`JobOutcome::Failed`]; they are not retried.
///
/// `on_progress` is called synchronously after each `Pending` response and
/// must not block.
pub async fn poll_until_terminal<F>(
    transport: &dyn JobTransport,
    handle: &JobHandle,
    config: &PollConfig,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Option<JobOutcome>
where
    F: FnMut(PollProgress),
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            tracing::debug!(job_id = %handle.job_id, attempts, "Polling cancelled");
            return None;
        }

        if !config.allows(attempts, started.elapsed()) {
            return Some(timed_out(handle, attempts, started));
        }

        attempts += 1;
        let budget = config.call_budget(started.elapsed());
        let response = match tokio::time::timeout(budget, transport.poll_job(handle)).await {
            Ok(response) => response,
            Err(_) => {
                if cancel.is_cancelled() {
                    return None;
                }
                tracing::warn!(
                    job_id = %handle.job_id,
                    attempt = attempts,
                    budget_ms = budget.as_millis() as u64,
                    "Poll call did not return in time",
                );
                return Some(timed_out(handle, attempts, started));
            }
        };

        // A result that arrives after cancellation belongs to nobody.
        if cancel.is_cancelled() {
            tracing::debug!(job_id = %handle.job_id, attempts, "Discarding poll result after cancel");
            return None;
        }

        let elapsed = started.elapsed();
        match response {
            Ok(PollResponse::Ready(artifact)) => {
                tracing::info!(
                    job_id = %handle.job_id,
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Job ready",
                );
                return Some(JobOutcome::Ready(artifact));
            }
            Ok(PollResponse::Failed(reason)) => {
                tracing::warn!(job_id = %handle.job_id, attempts, reason = %reason, "Job failed");
                return Some(JobOutcome::Failed(reason));
            }
            Err(e) => {
                tracing::error!(job_id = %handle.job_id, attempts, error = %e, "Poll request failed");
                return Some(JobOutcome::Failed(e.to_string()));
            }
            Ok(PollResponse::Pending) => {
                tracing::debug!(
                    job_id = %handle.job_id,
                    attempt = attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Job pending",
                );
                on_progress(PollProgress {
                    attempt: attempts,
                    elapsed,
                });
            }
        }

        // Skip the final sleep when no further attempt is allowed.
        if !config.allows(attempts, elapsed) {
            return Some(timed_out(handle, attempts, started));
        }

        let pause = remaining(config, started).map_or(config.interval, |left| left.min(config.interval));
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(job_id = %handle.job_id, attempts, "Polling cancelled");
                return None;
            }
            _ = tokio::time::sleep(pause) => {}
        }
    }
}

/// Wall-clock budget left, if a timeout is configured.
fn remaining(config: &PollConfig, started: Instant) -> Option<Duration> {
    config
        .timeout
        .map(|limit| limit.saturating_sub(started.elapsed()))
}

fn timed_out(handle: &JobHandle, attempts: u32, started: Instant) -> JobOutcome {
    tracing::warn!(
        job_id = %handle.job_id,
        attempts,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Polling budget exhausted",
    );
    JobOutcome::TimedOut
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use kontext_core::{Artifact, JobRequest};

    use super::*;
    use crate::transport::TransportError;

    /// Replays scripted poll responses; `Pending` once the script runs dry.
    struct Scripted {
        responses: Mutex<VecDeque<Result<PollResponse, TransportError>>>,
        polls: AtomicU32,
        delay: Duration,
        hang: bool,
    }

    impl Scripted {
        fn new(responses: Vec<Result<PollResponse, TransportError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                polls: AtomicU32::new(0),
                delay: Duration::ZERO,
                hang: false,
            }
        }

        fn polls(&self) -> u32 {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobTransport for Scripted {
        async fn submit_job(&self, _request: &JobRequest) -> Result<JobHandle, TransportError> {
            Ok(JobHandle::new("job-1"))
        }

        async fn poll_job(&self, _handle: &JobHandle) -> Result<PollResponse, TransportError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(PollResponse::Pending))
        }
    }

    fn attempts_only(max: u32) -> PollConfig {
        PollConfig::with_attempts(Duration::from_secs(1), max)
    }

    #[tokio::test(start_paused = true)]
    async fn ready_after_pending() {
        let transport = Scripted::new(vec![
            Ok(PollResponse::Pending),
            Ok(PollResponse::Pending),
            Ok(PollResponse::Ready(Artifact::Url("a1".into()))),
        ]);
        let mut progress = Vec::new();
        let outcome = poll_until_terminal(
            &transport,
            &JobHandle::new("job-1"),
            &attempts_only(10),
            &CancellationToken::new(),
            |p| progress.push(p.attempt),
        )
        .await;

        assert_eq!(outcome, Some(JobOutcome::Ready(Artifact::Url("a1".into()))));
        assert_eq!(transport.polls(), 3);
        assert_eq!(progress, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_attempts_times_out_without_extra_poll() {
        let transport = Scripted::new(vec![]);
        let outcome = poll_until_terminal(
            &transport,
            &JobHandle::new("job-1"),
            &attempts_only(3),
            &CancellationToken::new(),
            |_| {},
        )
        .await;

        assert_eq!(outcome, Some(JobOutcome::TimedOut));
        assert_eq!(transport.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_on_attempt_k_stops_immediately() {
        let transport = Scripted::new(vec![
            Ok(PollResponse::Pending),
            Ok(PollResponse::Failed("Request Moderated".into())),
            Ok(PollResponse::Ready(Artifact::Url("never".into()))),
        ]);
        let outcome = poll_until_terminal(
            &transport,
            &JobHandle::new("job-1"),
            &attempts_only(10),
            &CancellationToken::new(),
            |_| {},
        )
        .await;

        assert_eq!(outcome, Some(JobOutcome::Failed("Request Moderated".into())));
        assert_eq!(transport.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_is_not_retried() {
        let transport = Scripted::new(vec![Err(TransportError::Request("reset by peer".into()))]);
        let outcome = poll_until_terminal(
            &transport,
            &JobHandle::new("job-1"),
            &attempts_only(10),
            &CancellationToken::new(),
            |_| {},
        )
        .await;

        assert_eq!(
            outcome,
            Some(JobOutcome::Failed("Request failed: reset by peer".into()))
        );
        assert_eq!(transport.polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_timeout_wins_over_attempts() {
        let transport = Scripted::new(vec![]);
        let config = PollConfig {
            interval: Duration::from_secs(5),
            max_attempts: Some(1000),
            timeout: Some(Duration::from_secs(12)),
        };
        let started = Instant::now();
        let outcome = poll_until_terminal(
            &transport,
            &JobHandle::new("job-1"),
            &config,
            &CancellationToken::new(),
            |_| {},
        )
        .await;

        assert_eq!(outcome, Some(JobOutcome::TimedOut));
        // Polls at t=0, 5 and 10; the last sleep is clipped to the deadline.
        assert_eq!(transport.polls(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_poll_call_is_bounded_by_timeout() {
        let mut transport = Scripted::new(vec![]);
        transport.delay = Duration::from_secs(60);
        let config = PollConfig::with_timeout(Duration::from_secs(1), Duration::from_secs(10));
        let outcome = poll_until_terminal(
            &transport,
            &JobHandle::new("job-1"),
            &config,
            &CancellationToken::new(),
            |_| {},
        )
        .await;

        assert_eq!(outcome, Some(JobOutcome::TimedOut));
        assert_eq!(transport.polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_poll_call_times_out_under_attempts_only_budget() {
        let mut transport = Scripted::new(vec![]);
        transport.hang = true;
        let started = Instant::now();
        let outcome = poll_until_terminal(
            &transport,
            &JobHandle::new("job-1"),
            &attempts_only(3),
            &CancellationToken::new(),
            |_| {},
        )
        .await;

        assert_eq!(outcome, Some(JobOutcome::TimedOut));
        assert_eq!(transport.polls(), 1);
        assert_eq!(started.elapsed(), Duration::from_secs(kontext_core::polling::MAX_CALL_SECS));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_returns_none_without_polling() {
        let transport = Scripted::new(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = poll_until_terminal(
            &transport,
            &JobHandle::new("job-1"),
            &attempts_only(10),
            &cancel,
            |_| {},
        )
        .await;

        assert!(outcome.is_none());
        assert_eq!(transport.polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_sleep_stops_loop() {
        let transport = Scripted::new(vec![]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let outcome = poll_until_terminal(
            &transport,
            &JobHandle::new("job-1"),
            &attempts_only(10),
            &cancel,
            move |p| {
                if p.attempt == 2 {
                    trigger.cancel();
                }
            },
        )
        .await;

        assert!(outcome.is_none());
        assert_eq!(transport.polls(), 2);
    }
}
