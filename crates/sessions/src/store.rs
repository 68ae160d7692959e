//! File-backed conversation store.
//!
//! Persists conversation states in `conversations.json` under the
//! configured state path, with an in-memory write-through cache. Callers
//! follow a load → mutate-in-memory → save discipline: `load` clones out,
//! nothing mutates shared state in place, and a failed turn simply never
//! calls `save`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;

use cc_domain::error::{Error, Result};
use cc_domain::message::Message;
use cc_domain::trace::TraceEvent;

use crate::state::ConversationState;

/// Conversation store backed by a JSON file.
pub struct ConversationStore {
    states_path: PathBuf,
    states: RwLock<HashMap<String, ConversationState>>,
}

impl ConversationStore {
    /// Load or create the store at `state_path/conversations.json`.
    pub fn new(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;

        let states_path = state_path.join("conversations.json");
        let states = if states_path.exists() {
            let raw = std::fs::read_to_string(&states_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        tracing::info!(
            conversations = states.len(),
            path = %states_path.display(),
            "conversation store loaded"
        );

        Ok(Self {
            states_path,
            states: RwLock::new(states),
        })
    }

    /// Look up a state by its session key.
    pub fn load(&self, session_key: &str) -> Option<ConversationState> {
        self.states.read().get(session_key).cloned()
    }

    /// Resolve or create a state for the given key. Idempotent: an existing
    /// state is returned untouched. Returns `(state, is_new)`.
    pub fn initialize(
        &self,
        session_key: &str,
        priming: Vec<Message>,
    ) -> (ConversationState, bool) {
        // Fast path: state already exists.
        {
            let states = self.states.read();
            if let Some(state) = states.get(session_key) {
                return (state.clone(), false);
            }
        }

        let state = ConversationState::primed(session_key, priming);

        let mut states = self.states.write();
        // Re-check under the write lock; another turn may have initialized
        // the same key between the two lock scopes.
        if let Some(existing) = states.get(session_key) {
            return (existing.clone(), false);
        }
        states.insert(session_key.to_owned(), state.clone());

        TraceEvent::StateInitialized {
            session_key: session_key.to_owned(),
            state_id: state.state_id.clone(),
            priming_messages: state.history.len(),
        }
        .emit();

        (state, true)
    }

    /// Unconditionally replace the state with a fresh priming sequence and
    /// an empty transcript (the restart action).
    pub fn reset(&self, session_key: &str, priming: Vec<Message>) -> ConversationState {
        let fresh = ConversationState::primed(session_key, priming);

        let mut states = self.states.write();
        let old_id = states
            .insert(session_key.to_owned(), fresh.clone())
            .map(|old| old.state_id)
            .unwrap_or_default();

        TraceEvent::StateReset {
            session_key: session_key.to_owned(),
            old_state_id: old_id,
            new_state_id: fresh.state_id.clone(),
            transcript_cleared: true,
        }
        .emit();

        fresh
    }

    /// Re-prime the history but keep the transcript (the cancel action).
    /// Returns `None` when no state exists for the key.
    pub fn reset_history(
        &self,
        session_key: &str,
        priming: Vec<Message>,
    ) -> Option<ConversationState> {
        let mut states = self.states.write();
        let state = states.get_mut(session_key)?;

        let old_id = state.state_id.clone();
        state.state_id = uuid::Uuid::new_v4().to_string();
        state.history = priming;
        state.updated_at = Utc::now();

        TraceEvent::StateReset {
            session_key: session_key.to_owned(),
            old_state_id: old_id,
            new_state_id: state.state_id.clone(),
            transcript_cleared: false,
        }
        .emit();

        Some(state.clone())
    }

    /// Replace the stored entry for a key with the given state.
    pub fn save(&self, session_key: &str, mut state: ConversationState) {
        state.updated_at = Utc::now();
        self.states.write().insert(session_key.to_owned(), state);
    }

    /// Drop a state entirely.
    pub fn delete(&self, session_key: &str) -> bool {
        self.states.write().remove(session_key).is_some()
    }

    /// List all session keys (for diagnostics).
    pub fn keys(&self) -> Vec<String> {
        self.states.read().keys().cloned().collect()
    }

    /// Persist the current map to disk.
    pub fn flush(&self) -> Result<()> {
        let states = self.states.read();
        let json = serde_json::to_string_pretty(&*states)?;
        std::fs::write(&self.states_path, json).map_err(Error::Io)?;
        Ok(())
    }
}
