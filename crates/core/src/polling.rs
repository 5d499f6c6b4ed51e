//! Polling bounds, defaults and validation.

use std::time::Duration;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Seconds between two polls of the same job.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Poll attempts before giving up (60 x 5 s = 5 minutes).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;
/// Wall-clock ceiling for one job, independent of the attempt count.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
/// Longest a single poll call may take, whatever the overall budget.
pub const MAX_CALL_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// PollConfig
// ---------------------------------------------------------------------------

/// Bounds for one poll loop. Whichever of `max_attempts` and `timeout` is
/// reached first ends the loop with a time-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }
}

impl PollConfig {
    /// Bounded by attempts only.
    pub fn with_attempts(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts),
            timeout: None,
        }
    }

    /// Bounded by wall-clock time only.
    pub fn with_timeout(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            timeout: Some(timeout),
        }
    }

    /// Check the bounds are usable: a non-zero interval and at least one
    /// non-zero limit, so the loop always terminates.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.interval.is_zero() {
            return Err(CoreError::Validation(
                "Poll interval must be greater than zero".to_string(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(CoreError::Validation(
                "max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(CoreError::Validation(
                "Poll timeout must be greater than zero".to_string(),
            ));
        }
        if self.max_attempts.is_none() && self.timeout.is_none() {
            return Err(CoreError::Validation(
                "At least one of max_attempts or timeout must be set".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether another attempt may start after `attempts` have completed
    /// and `elapsed` time has passed.
    pub fn allows(&self, attempts: u32, elapsed: Duration) -> bool {
        let attempts_ok = self.max_attempts.map_or(true, |max| attempts < max);
        let time_ok = self.timeout.map_or(true, |limit| elapsed < limit);
        attempts_ok && time_ok
    }

    /// How long a poll call started at `elapsed` may run: the wall-clock
    /// budget left, capped at [`MAX_CALL_SECS`].
    pub fn call_budget(&self, elapsed: Duration) -> Duration {
        let per_call = Duration::from_secs(MAX_CALL_SECS);
        self.timeout
            .map_or(per_call, |limit| limit.saturating_sub(elapsed).min(per_call))
    }
}
