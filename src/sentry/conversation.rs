//! Conversation log for the chat phase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    System,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Ordered, append-only within a cycle; cleared on reset.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Conversation {
    entries: Vec<ConversationEntry>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.entries.push(ConversationEntry {
            speaker,
            text: text.into(),
            at: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries spoken by `speaker`.
    pub fn count(&self, speaker: Speaker) -> usize {
        self.entries.iter().filter(|e| e.speaker == speaker).count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
