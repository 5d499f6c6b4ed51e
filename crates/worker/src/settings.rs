//! Poll bounds and default job options read from the environment.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use kontext_core::polling::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS};
use kontext_core::request::{
    JobOptions, OPTION_ASPECT_RATIO, OPTION_OUTPUT_FORMAT, OPTION_SAFETY_TOLERANCE, OPTION_SEED,
};
use kontext_core::PollConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub poll: PollConfig,
    /// Sent with every job; provider defaults fill in the rest.
    pub options: JobOptions,
}

impl WorkerSettings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let interval_secs: u64 =
            parse_or(get("POLL_INTERVAL_SECS"), "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let max_attempts: u32 =
            parse_or(get("POLL_MAX_ATTEMPTS"), "POLL_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        let timeout_secs: u64 =
            parse_or(get("POLL_TIMEOUT_SECS"), "POLL_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        // Zero switches a bound off.
        let poll = PollConfig {
            interval: Duration::from_secs(interval_secs),
            max_attempts: (max_attempts > 0).then_some(max_attempts),
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        };
        poll.validate().context("invalid poll settings")?;

        let mut options = JobOptions::new();
        if let Some(ratio) = get("ASPECT_RATIO") {
            options.insert(OPTION_ASPECT_RATIO.into(), ratio.into());
        }
        if let Some(format) = get("OUTPUT_FORMAT") {
            options.insert(OPTION_OUTPUT_FORMAT.into(), format.into());
        }
        if let Some(raw) = get("SAFETY_TOLERANCE") {
            let tolerance: u8 = parse("SAFETY_TOLERANCE", &raw)?;
            options.insert(OPTION_SAFETY_TOLERANCE.into(), tolerance.into());
        }
        if let Some(raw) = get("SEED") {
            let seed: u64 = parse("SEED", &raw)?;
            options.insert(OPTION_SEED.into(), seed.into());
        }

        Ok(Self { poll, options })
    }
}

fn parse<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse()
        .with_context(|| format!("{key} must be a non-negative integer, got {raw:?}"))
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.map_or(Ok(default), |raw| parse(key, &raw))
}
