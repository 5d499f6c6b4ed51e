//! Job handles, poll responses, outcomes and the orchestrator state machine.

use std::time::Duration;

use serde::Serialize;

use crate::artifact::Artifact;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Local identifier for one orchestrator run, independent of the
/// provider-assigned job id. A fresh one is minted on every submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(uuid::Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Returned by a successful submission.
///
/// Some providers require polling a job-specific URL rather than a fixed
/// endpoint; `poll_location` carries it when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub job_id: String,
    pub poll_location: Option<String>,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            poll_location: None,
        }
    }

    pub fn with_poll_location(mut self, location: impl Into<String>) -> Self {
        self.poll_location = Some(location.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Transport poll response
// ---------------------------------------------------------------------------

/// What a single poll of the provider reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResponse {
    Ready(Artifact),
    Pending,
    Failed(String),
}

// ---------------------------------------------------------------------------
// JobOutcome
// ---------------------------------------------------------------------------

/// Terminal result of polling one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum JobOutcome {
    Ready(Artifact),
    /// Provider or transport failure; the reason is passed through verbatim.
    Failed(String),
    /// The local attempt or wall-clock budget ran out.
    TimedOut,
}

impl JobOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            Self::Ready(artifact) => Some(artifact),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// The orchestrator's view of its current (or most recent) job.
///
/// Transitions for one run are monotonic:
/// `Idle -> Submitting -> Polling -> {Succeeded, Failed, TimedOut}`, with
/// `Submitting -> Failed` on submit errors and `cancel() -> Idle` from
/// either active state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Submitting,
    Polling {
        handle: JobHandle,
        attempt: u32,
        elapsed: Duration,
    },
    Succeeded {
        artifact: Artifact,
    },
    Failed {
        reason: String,
    },
    TimedOut,
}

impl JobState {
    /// A job is in flight and a new submit would be rejected.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitting | Self::Polling { .. })
    }

    /// No further automatic transition will happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::TimedOut
        )
    }

    /// Short status line for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Submitting => "Submitting request...",
            Self::Polling { .. } => "Generating image...",
            Self::Succeeded { .. } => "Image ready",
            Self::Failed { .. } => "Generation failed",
            Self::TimedOut => "Generation timeout",
        }
    }
}

impl From<JobOutcome> for JobState {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Ready(artifact) => Self::Succeeded { artifact },
            JobOutcome::Failed(reason) => Self::Failed { reason },
            JobOutcome::TimedOut => Self::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_and_terminal_are_disjoint() {
        let states = [
            JobState::Idle,
            JobState::Submitting,
            JobState::Polling {
                handle: JobHandle::new("j"),
                attempt: 1,
                elapsed: Duration::from_secs(5),
            },
            JobState::Succeeded {
                artifact: Artifact::Url("u".into()),
            },
            JobState::Failed { reason: "r".into() },
            JobState::TimedOut,
        ];
        for state in &states {
            assert!(!(state.is_active() && state.is_terminal()), "{state:?}");
        }
        assert!(!JobState::Idle.is_active());
        assert!(!JobState::Idle.is_terminal());
    }

    #[test]
    fn outcome_maps_to_terminal_state() {
        let ready = JobState::from(JobOutcome::Ready(Artifact::Url("a1".into())));
        assert_eq!(
            ready,
            JobState::Succeeded {
                artifact: Artifact::Url("a1".into())
            }
        );
        assert!(JobState::from(JobOutcome::TimedOut).is_terminal());
        assert_eq!(
            JobState::from(JobOutcome::Failed("content policy violation".into())),
            JobState::Failed {
                reason: "content policy violation".into()
            }
        );
    }

    #[test]
    fn labels_follow_the_lifecycle() {
        let cases = [
            (JobState::Idle, "Idle"),
            (JobState::Submitting, "Submitting request..."),
            (
                JobState::Polling {
                    handle: JobHandle::new("j"),
                    attempt: 3,
                    elapsed: Duration::from_secs(10),
                },
                "Generating image...",
            ),
            (
                JobState::Succeeded {
                    artifact: Artifact::Url("u".into()),
                },
                "Image ready",
            ),
            (JobState::Failed { reason: "r".into() }, "Generation failed"),
            (JobState::TimedOut, "Generation timeout"),
        ];
        for (state, label) in cases {
            assert_eq!(state.label(), label);
        }
    }

    #[test]
    fn only_ready_outcomes_carry_an_artifact() {
        let ready = JobOutcome::Ready(Artifact::Url("a1".into()));
        assert!(ready.is_ready());
        assert_eq!(ready.artifact(), Some(&Artifact::Url("a1".into())));

        for other in [JobOutcome::Failed("nope".into()), JobOutcome::TimedOut] {
            assert!(!other.is_ready());
            assert_eq!(other.artifact(), None);
        }
    }

    #[test]
    fn handle_poll_location_is_optional() {
        let plain = JobHandle::new("abc");
        assert!(plain.poll_location.is_none());
        let located = JobHandle::new("abc").with_poll_location("https://poll/abc");
        assert_eq!(located.poll_location.as_deref(), Some("https://poll/abc"));
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
