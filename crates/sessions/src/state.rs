//! Conversation state: the two parallel logs plus metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cc_domain::error::{Error, Result};
use cc_domain::message::{DisplayMessage, Message, Role};

/// One conversation's state, keyed by `(conversation_id, user_id)`.
///
/// `history` is the authoritative, provider-facing message sequence — the
/// only thing ever sent to the provider. `transcript` is the display-only
/// projection shown to the end user. Both are append-only within a turn;
/// truncation may drop leading `history` entries but never touches
/// `transcript`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_key: String,
    /// Rotated on every reset so downstream consumers can detect restarts.
    pub state_id: String,
    pub history: Vec<Message>,
    pub transcript: Vec<DisplayMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Create a freshly primed state.
    pub fn primed(session_key: &str, priming: Vec<Message>) -> Self {
        let now = Utc::now();
        Self {
            session_key: session_key.to_owned(),
            state_id: uuid::Uuid::new_v4().to_string(),
            history: priming,
            transcript: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the log invariants. Violations mean the state cannot be
    /// repaired automatically; the documented recovery is a reset.
    pub fn validate(&self) -> Result<()> {
        for (i, msg) in self.history.iter().enumerate() {
            if !msg.is_well_formed() {
                return Err(Error::InvalidState(format!(
                    "history[{i}] carries is_context on a {:?} message",
                    msg.role
                )));
            }
        }
        Ok(())
    }

    /// Whether the history still starts with at least one priming message.
    pub fn is_primed(&self) -> bool {
        self.history
            .first()
            .map(|m| m.role == Role::System && !m.is_context)
            .unwrap_or(false)
    }
}
