//! Client-side orchestration of long-running remote generation jobs.
//!
//! Submits a request through a [`JobTransport`], polls the resulting job
//! at a fixed interval under an attempt and wall-clock budget, and reports
//! progress and a single terminal outcome. An optional [`EditChain`]
//! feeds each successful result back in as the input of the next edit.

pub mod chain;
pub mod events;
pub mod orchestrator;
pub mod poll;
pub mod transport;

pub use chain::EditChain;
pub use events::JobEvent;
pub use orchestrator::{JobOrchestrator, SubmitRejected};
pub use poll::{poll_until_terminal, PollProgress};
pub use transport::{JobTransport, TransportError};
