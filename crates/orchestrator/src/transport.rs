//! The seam between the orchestrator and a compute provider.
//!
//! A [`JobTransport`] performs the actual network calls. The orchestrator
//! only ever sees [`JobHandle`]s, [`PollResponse`]s and
//! [`TransportError`]s; authentication, request encoding and retries of
//! individual HTTP calls all live behind this trait.

use async_trait::async_trait;
use kontext_core::{JobHandle, JobRequest, PollResponse};

/// Submit and poll operations a provider integration must supply.
#[async_trait]
pub trait JobTransport: Send + Sync {
    /// Start a job on the provider. Returns the handle used for polling.
    async fn submit_job(&self, request: &JobRequest) -> Result<JobHandle, TransportError>;

    /// Ask the provider for the current status of a job.
    async fn poll_job(&self, handle: &JobHandle) -> Result<PollResponse, TransportError>;
}

/// Failures raised by a transport. None of these are retried by the
/// orchestrator; each ends the job as `Failed` with the `Display` text as
/// its reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response (network, DNS, TLS, ...).
    #[error("Request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success status.
    #[error("Provider error ({status}): {reason}")]
    Provider {
        /// HTTP (or provider-specific) status code.
        status: u16,
        /// Provider-supplied message, passed through unchanged.
        reason: String,
    },

    /// The provider answered but the body could not be understood.
    #[error("Malformed response: {0}")]
    Malformed(String),
}
