//! Connection settings for the Black Forest Labs API.

use crate::api::BflError;

pub const DEFAULT_API_URL: &str = "https://api.bfl.ai";
pub const DEFAULT_MODEL: &str = "flux-kontext-pro";

/// Where and as whom to call the provider.
#[derive(Clone)]
pub struct BflConfig {
    pub api_key: String,
    /// Base URL without a trailing slash.
    pub api_url: String,
    /// Model path segment, e.g. `flux-kontext-pro` or `flux-kontext-max`.
    pub model: String,
}

impl std::fmt::Debug for BflConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BflConfig")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

impl BflConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Read `BFL_API_KEY` (required), `BFL_API_URL` and `BFL_MODEL`.
    pub fn from_env() -> Result<Self, BflError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BflError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("BFL_API_KEY")
            .ok_or_else(|| BflError::Config("BFL_API_KEY must be set".to_string()))?;
        let api_url = get("BFL_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let model = get("BFL_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self {
            api_key,
            api_url,
            model,
        })
    }
}
