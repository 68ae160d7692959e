use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message in the provider-facing history (provider-agnostic).
///
/// `is_context` marks system messages synthesized from retrieved documents,
/// so truncation and display logic can treat injected context differently
/// from priming instructions. It is always present and defaults to `false`;
/// it may only be `true` on a system message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_context: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

// ── Convenience constructors ───────────────────────────────────────

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: text.into(), is_context: false }
    }
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: text.into(), is_context: false }
    }
    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: text.into(), is_context: false }
    }
    /// A system message carrying injected retrieval context.
    pub fn context(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: text.into(), is_context: true }
    }

    /// Check the shape invariant: `is_context` is only legal on system
    /// messages.
    pub fn is_well_formed(&self) -> bool {
        !self.is_context || self.role == Role::System
    }
}

/// One entry of the human-facing transcript.
///
/// `speaker` is a display label (the viewing user's name or the provider's
/// display name), never a raw role string. The transcript is a projection
/// for rendering only; it never feeds back into the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMessage {
    pub speaker: String,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl DisplayMessage {
    pub fn now(speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
            at: Utc::now(),
        }
    }
}
