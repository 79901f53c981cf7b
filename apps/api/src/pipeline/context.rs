//! Conversation context — what every role sees when its turn starts.

use serde::{Deserialize, Serialize};

/// One completed role turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub output: String,
}

/// Candidate and job inputs plus the append-only history of prior role outputs.
///
/// Owned by exactly one run. Entries are never reordered or rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    candidate_text: String,
    job_text: String,
    history: Vec<HistoryEntry>,
}

impl ConversationContext {
    pub fn new(candidate_text: impl Into<String>, job_text: impl Into<String>) -> Self {
        Self {
            candidate_text: candidate_text.into(),
            job_text: job_text.into(),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn append(&mut self, role: impl Into<String>, output: impl Into<String>) {
        self.history.push(HistoryEntry {
            role: role.into(),
            output: output.into(),
        });
    }

    /// Renders the context as the user message handed to the next role.
    pub fn transcript(&self) -> String {
        let mut out = format!(
            "Please evaluate this candidate:\n\nCV:\n{}\n\nJob Description:\n{}",
            self.candidate_text, self.job_text
        );
        for entry in &self.history {
            out.push_str(&format!(
                "\n\n--- Output from {} ---\n{}",
                entry.role, entry.output
            ));
        }
        out
    }
}
