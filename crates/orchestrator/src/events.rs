//! Notifications emitted by a [`JobOrchestrator`](crate::JobOrchestrator).
//!
//! Events are broadcast; sending never blocks the poll loop and is simply
//! dropped when nobody is subscribed. Every event carries the [`RunId`] of
//! the run it belongs to so late subscribers can ignore stale runs.

use std::time::Duration;

use chrono::{DateTime, Utc};
use kontext_core::{JobOutcome, RunId};
use serde::Serialize;

/// A lifecycle notification for one orchestrator run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// The provider accepted the job and polling is about to begin.
    Submitted {
        run_id: RunId,
        job_id: String,
        at: DateTime<Utc>,
    },

    /// A poll returned `Pending`.
    Progress {
        run_id: RunId,
        attempt: u32,
        elapsed: Duration,
    },

    /// The run reached a terminal outcome. Sent exactly once per run that
    /// was not cancelled.
    Completed {
        run_id: RunId,
        outcome: JobOutcome,
        at: DateTime<Utc>,
    },

    /// The run was cancelled by the caller. No `Completed` follows.
    Cancelled { run_id: RunId, at: DateTime<Utc> },
}

impl JobEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            Self::Submitted { run_id, .. }
            | Self::Progress { run_id, .. }
            | Self::Completed { run_id, .. }
            | Self::Cancelled { run_id, .. } => *run_id,
        }
    }
}
