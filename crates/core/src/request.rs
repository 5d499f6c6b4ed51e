//! Job submission requests and the provider option keys callers may set.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::artifact::Artifact;
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Well-known provider option keys
// ---------------------------------------------------------------------------

/// Output aspect ratio, e.g. `"16:9"`. Generation only by default.
pub const OPTION_ASPECT_RATIO: &str = "aspect_ratio";
/// Deterministic seed.
pub const OPTION_SEED: &str = "seed";
/// `"jpeg"` or `"png"`.
pub const OPTION_OUTPUT_FORMAT: &str = "output_format";
/// Moderation tolerance, 0 (strict) to 6 (permissive).
pub const OPTION_SAFETY_TOLERANCE: &str = "safety_tolerance";
/// Let the provider rewrite the prompt before sampling.
pub const OPTION_PROMPT_UPSAMPLING: &str = "prompt_upsampling";

/// Provider-specific options. Values are opaque to the orchestrator.
pub type JobOptions = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// JobRequest
// ---------------------------------------------------------------------------

/// One submission: an instruction, an optional source artifact and
/// provider options.
///
/// A request without a source is a fresh generation; with a source it is
/// an edit of that artifact. Requests are immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRequest {
    instruction: String,
    source: Option<Artifact>,
    options: JobOptions,
}

impl JobRequest {
    /// A pure generation request.
    pub fn generate(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            source: None,
            options: JobOptions::new(),
        }
    }

    /// An edit of `source`.
    pub fn edit(instruction: impl Into<String>, source: Artifact) -> Self {
        Self {
            instruction: instruction.into(),
            source: Some(source),
            options: JobOptions::new(),
        }
    }

    /// Set a single provider option, replacing any previous value.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Merge a set of provider options. Later values win.
    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options.extend(options);
        self
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn source(&self) -> Option<&Artifact> {
        self.source.as_ref()
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    /// Whether this request edits an existing artifact.
    pub fn is_edit(&self) -> bool {
        self.source.is_some()
    }

    /// Reject requests no provider could act on.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.instruction.trim().is_empty() {
            return Err(CoreError::Validation(
                "Instruction must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
