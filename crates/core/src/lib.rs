//! Domain types shared by the job orchestrator and its transports.
//!
//! Nothing in this crate performs I/O. It defines the values that flow
//! between a caller, the orchestrator and a provider transport, plus the
//! polling bounds and their validation.

pub mod artifact;
pub mod error;
pub mod history;
pub mod job;
pub mod polling;
pub mod request;

pub use artifact::Artifact;
pub use error::CoreError;
pub use history::EditHistoryEntry;
pub use job::{JobHandle, JobOutcome, JobState, PollResponse, RunId};
pub use polling::PollConfig;
pub use request::JobRequest;
