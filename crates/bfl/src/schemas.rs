//! Black Forest Labs request and response shapes, and their mapping onto
//! the orchestrator's provider-neutral types.

use kontext_core::request::{
    JobOptions, OPTION_ASPECT_RATIO, OPTION_OUTPUT_FORMAT, OPTION_PROMPT_UPSAMPLING,
    OPTION_SAFETY_TOLERANCE,
};
use kontext_core::{Artifact, JobRequest, PollResponse};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_ASPECT_RATIO: &str = "1:1";
pub const DEFAULT_OUTPUT_FORMAT: &str = "jpeg";
pub const DEFAULT_SAFETY_TOLERANCE: u8 = 2;

// ---------------------------------------------------------------------------
// Provider status strings
// ---------------------------------------------------------------------------

pub const STATUS_READY: &str = "Ready";
pub const STATUS_PENDING: &str = "Pending";
pub const STATUS_ERROR: &str = "Error";
pub const STATUS_FAILED: &str = "Failed";
pub const STATUS_REQUEST_MODERATED: &str = "Request Moderated";
pub const STATUS_CONTENT_MODERATED: &str = "Content Moderated";
pub const STATUS_TASK_NOT_FOUND: &str = "Task not found";

// ---------------------------------------------------------------------------
// Request body
// ---------------------------------------------------------------------------

/// Build the JSON body for a generation or edit submission.
///
/// Caller options are merged over the defaults. Generations default to a
/// square aspect ratio with prompt upsampling; edits send the source as
/// `input_image` and let the provider keep the source's aspect ratio.
pub fn build_request_body(request: &JobRequest) -> serde_json::Value {
    let mut body = JobOptions::new();
    body.insert(OPTION_OUTPUT_FORMAT.into(), DEFAULT_OUTPUT_FORMAT.into());
    body.insert(
        OPTION_SAFETY_TOLERANCE.into(),
        DEFAULT_SAFETY_TOLERANCE.into(),
    );

    match request.source() {
        Some(source) => {
            body.insert("input_image".into(), source.as_str().into());
        }
        None => {
            body.insert(OPTION_ASPECT_RATIO.into(), DEFAULT_ASPECT_RATIO.into());
            body.insert(OPTION_PROMPT_UPSAMPLING.into(), true.into());
        }
    }

    for (key, value) in request.options() {
        if value.is_null() {
            body.remove(key);
        } else {
            body.insert(key.clone(), value.clone());
        }
    }
    body.insert("prompt".into(), request.instruction().into());

    serde_json::Value::Object(body.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Returned by the submission endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub id: String,
    /// Present on the global endpoint; polling must use it when set.
    #[serde(default)]
    pub polling_url: Option<String>,
}

/// Returned by `get_result` / the polling URL.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub result: Option<ResultPayload>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultPayload {
    /// Signed delivery URL of the generated image.
    #[serde(default)]
    pub sample: Option<String>,
}

/// Translate a provider status into a [`PollResponse`].
///
/// Unknown statuses are treated as still in progress; the provider adds
/// intermediate states from time to time.
pub fn map_result(response: ResultResponse) -> PollResponse {
    let ResultResponse {
        status,
        result,
        error,
        ..
    } = response;

    match status.as_str() {
        STATUS_READY => match result.and_then(|r| r.sample) {
            Some(sample) => PollResponse::Ready(Artifact::Url(sample)),
            None => PollResponse::Failed("provider reported Ready without a result".to_string()),
        },
        STATUS_PENDING => PollResponse::Pending,
        STATUS_ERROR | STATUS_FAILED => {
            PollResponse::Failed(error.unwrap_or_else(|| status.clone()))
        }
        STATUS_REQUEST_MODERATED | STATUS_CONTENT_MODERATED | STATUS_TASK_NOT_FOUND => {
            PollResponse::Failed(status.clone())
        }
        other => {
            tracing::debug!(status = other, "Unrecognised provider status, treating as pending");
            PollResponse::Pending
        }
    }
}

/// Extract a human-readable reason from an error body.
///
/// Uses `detail` (a string, or a list of validation errors with `msg`) or
/// `message` when the body is JSON; otherwise returns the body as-is.
pub fn error_reason(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };

    match json.get("detail") {
        Some(serde_json::Value::String(detail)) => return detail.clone(),
        Some(serde_json::Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if !messages.is_empty() {
                return messages.join("; ");
            }
        }
        _ => {}
    }

    json.get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}
