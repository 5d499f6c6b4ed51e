//! REST API client for the Black Forest Labs image endpoints.
//!
//! Wraps job submission (`POST /v1/{model}`) and result retrieval
//! (`GET /v1/get_result` or the per-job polling URL) using [`reqwest`].

use std::time::Duration;

use crate::config::BflConfig;
use crate::schemas::{ResultResponse, SubmitResponse};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-key";

/// Per-request timeout for every call to the provider.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client bound to one API key and model.
pub struct BflApi {
    client: reqwest::Client,
    config: BflConfig,
}

/// Errors from the BFL REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum BflError {
    /// The HTTP request itself failed (network, DNS, TLS, body decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("BFL API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// Missing or invalid client configuration.
    #[error("BFL configuration error: {0}")]
    Config(String),
}

impl BflApi {
    /// Create a client with [`REQUEST_TIMEOUT`] applied to every call.
    pub fn new(config: BflConfig) -> Result<Self, BflError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: BflConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &BflConfig {
        &self.config
    }

    /// Endpoint jobs for the configured model are posted to.
    pub fn submit_url(&self) -> String {
        format!("{}/v1/{}", self.config.api_url, self.config.model)
    }

    /// Fallback polling endpoint for providers that return no polling URL.
    pub fn result_url(&self) -> String {
        format!("{}/v1/get_result", self.config.api_url)
    }

    /// Submit a generation or edit request body.
    pub async fn submit(&self, body: &serde_json::Value) -> Result<SubmitResponse, BflError> {
        let response = self
            .client
            .post(self.submit_url())
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the current status of a job.
    ///
    /// Uses `polling_url` verbatim when the submission returned one,
    /// otherwise queries `get_result` by id.
    pub async fn get_result(
        &self,
        id: &str,
        polling_url: Option<&str>,
    ) -> Result<ResultResponse, BflError> {
        let request = match polling_url {
            Some(url) => self.client.get(url),
            None => self.client.get(self.result_url()).query(&[("id", id)]),
        };

        let response = request
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Turn any non-2xx answer into [`BflError::Api`], keeping the body
    /// so the provider's reason can be extracted later.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BflError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BflError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Reject error statuses, then decode the JSON payload.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BflError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
