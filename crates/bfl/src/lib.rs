//! Black Forest Labs (FLUX Kontext) provider for the job orchestrator.
//!
//! [`BflTransport`] turns a [`kontext_core::JobRequest`] into a BFL
//! submission and maps the provider's polling statuses onto
//! [`kontext_core::PollResponse`].

pub mod api;
pub mod config;
pub mod schemas;
pub mod transport;

pub use api::{BflApi, BflError};
pub use config::BflConfig;
pub use transport::BflTransport;
