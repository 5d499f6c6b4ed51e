//! Linear edit history for iterative editing.
//!
//! An [`EditChain`] remembers the artifact the user started from and every
//! successful edit applied on top of it. The input to the next edit is
//! always the newest result, or the base when nothing has succeeded yet.

use kontext_core::{Artifact, EditHistoryEntry};

#[derive(Debug, Clone)]
pub struct EditChain {
    base: Artifact,
    history: Vec<EditHistoryEntry>,
}

impl EditChain {
    pub fn new(base: Artifact) -> Self {
        Self {
            base,
            history: Vec::new(),
        }
    }

    /// Start over from a new base artifact, dropping all history.
    ///
    /// This does not touch any job in flight. Cancel the owning
    /// orchestrator's job first, or use
    /// [`JobOrchestrator::replace_base`](crate::JobOrchestrator::replace_base)
    /// which does both in the right order.
    pub fn reset(&mut self, base: Artifact) {
        tracing::info!(dropped = self.history.len(), base = %base, "Edit chain reset");
        self.base = base;
        self.history.clear();
    }

    /// The artifact the next edit should start from.
    pub fn current_artifact(&self) -> &Artifact {
        self.history
            .last()
            .map_or(&self.base, |entry| &entry.artifact)
    }

    /// Append a successful edit. Failed or timed-out edits are never
    /// recorded, so they leave the current artifact untouched.
    pub fn record_success(&mut self, instruction: impl Into<String>, artifact: Artifact) {
        let entry = EditHistoryEntry::new(instruction, artifact);
        tracing::debug!(
            step = self.history.len() + 1,
            instruction = %entry.instruction,
            artifact = %entry.artifact,
            "Edit recorded",
        );
        self.history.push(entry);
    }

    /// Completed edits in the order they finished.
    pub fn history(&self) -> &[EditHistoryEntry] {
        &self.history
    }

    pub fn base(&self) -> &Artifact {
        &self.base
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
