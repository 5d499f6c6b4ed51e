//! Edit history records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::artifact::Artifact;

/// One completed edit step: the instruction that was applied and the
/// artifact it produced. Entries are created only for successful edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditHistoryEntry {
    pub instruction: String,
    pub artifact: Artifact,
    pub recorded_at: DateTime<Utc>,
}

impl EditHistoryEntry {
    pub fn new(instruction: impl Into<String>, artifact: Artifact) -> Self {
        Self {
            instruction: instruction.into(),
            artifact,
            recorded_at: Utc::now(),
        }
    }
}
