//! [`JobTransport`] implementation backed by the BFL REST API.

use async_trait::async_trait;
use kontext_core::{JobHandle, JobRequest, PollResponse};
use kontext_orchestrator::{JobTransport, TransportError};

use crate::api::{BflApi, BflError};
use crate::config::BflConfig;
use crate::schemas::{build_request_body, error_reason, map_result};

/// Submits jobs to and polls results from Black Forest Labs.
pub struct BflTransport {
    api: BflApi,
}

impl BflTransport {
    pub fn new(config: BflConfig) -> Result<Self, BflError> {
        BflApi::new(config).map(Self::from_api)
    }

    pub fn from_api(api: BflApi) -> Self {
        Self { api }
    }

    /// Build a transport from `BFL_*` environment variables.
    pub fn from_env() -> Result<Self, BflError> {
        BflConfig::from_env().and_then(Self::new)
    }

    pub fn api(&self) -> &BflApi {
        &self.api
    }
}

#[async_trait]
impl JobTransport for BflTransport {
    async fn submit_job(&self, request: &JobRequest) -> Result<JobHandle, TransportError> {
        let body = build_request_body(request);
        let submitted = self.api.submit(&body).await.map_err(to_transport_error)?;

        tracing::info!(
            job_id = %submitted.id,
            model = %self.api.config().model,
            edit = request.is_edit(),
            "BFL job submitted",
        );

        let handle = JobHandle::new(submitted.id);
        Ok(match submitted.polling_url {
            Some(url) => handle.with_poll_location(url),
            None => handle,
        })
    }

    async fn poll_job(&self, handle: &JobHandle) -> Result<PollResponse, TransportError> {
        let result = self
            .api
            .get_result(&handle.job_id, handle.poll_location.as_deref())
            .await
            .map_err(to_transport_error)?;

        tracing::debug!(job_id = %handle.job_id, status = %result.status, "BFL poll");
        Ok(map_result(result))
    }
}

/// Flatten a client error into the provider-neutral transport error.
pub fn to_transport_error(err: BflError) -> TransportError {
    match err {
        BflError::Request(e) if e.is_decode() => TransportError::Malformed(e.to_string()),
        BflError::Request(e) => TransportError::Request(e.to_string()),
        BflError::Api { status, body } => TransportError::Provider {
            status,
            reason: error_reason(&body),
        },
        BflError::Config(msg) => TransportError::Request(msg),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn api_error_becomes_provider_error_with_reason() {
        let err = to_transport_error(BflError::Api {
            status: 402,
            body: r#"{"detail":"Insufficient credits"}"#.into(),
        });
        assert_eq!(
            err,
            TransportError::Provider {
                status: 402,
                reason: "Insufficient credits".into()
            }
        );
        assert_eq!(err.to_string(), "Provider error (402): Insufficient credits");
    }

    #[test]
    fn transport_wraps_a_supplied_client() {
        let mut config = BflConfig::new("k");
        config.model = "flux-kontext-max".into();
        let api = BflApi::with_client(reqwest::Client::new(), config);
        let transport = BflTransport::from_api(api);
        assert_eq!(transport.api().config().model, "flux-kontext-max");

        let built = BflTransport::new(BflConfig::new("k")).unwrap();
        assert_eq!(built.api().config().model, crate::config::DEFAULT_MODEL);
    }

    #[test]
    fn config_error_becomes_request_error() {
        assert_matches!(
            to_transport_error(BflError::Config("BFL_API_KEY must be set".into())),
            TransportError::Request(msg) if msg.contains("BFL_API_KEY")
        );
    }
}
