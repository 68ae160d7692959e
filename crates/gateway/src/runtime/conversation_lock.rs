//! Per-conversation concurrency control.
//!
//! At most one turn mutates a conversation state at a time. A second
//! request for the same session key serializes behind the in-flight turn;
//! callers that would rather fail fast use [`ConversationLockMap::try_acquire`].
//! Silent interleaving is never allowed — it would corrupt the append-only
//! logs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use cc_domain::error::{Error, Result};

/// Manages per-conversation turn locks.
///
/// Each session key maps to a `Semaphore(1)`. Holding the permit grants
/// exclusive ownership of that key's state for the duration of one turn;
/// it auto-releases on drop.
pub struct ConversationLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for ConversationLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn semaphore(&self, session_key: &str) -> Arc<Semaphore> {
        let mut locks = self.locks.lock();
        locks
            .entry(session_key.to_owned())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    /// Acquire the turn lock for a conversation, waiting behind any
    /// in-flight turn (serialization preserves request ordering).
    pub async fn acquire(&self, session_key: &str) -> Result<OwnedSemaphorePermit> {
        self.semaphore(session_key)
            .acquire_owned()
            .await
            .map_err(|_| Error::TurnInProgress(session_key.to_owned()))
    }

    /// Acquire without waiting; fails with `TurnInProgress` when a turn is
    /// already running for the key.
    pub fn try_acquire(&self, session_key: &str) -> Result<OwnedSemaphorePermit> {
        self.semaphore(session_key)
            .try_acquire_owned()
            .map_err(|_| Error::TurnInProgress(session_key.to_owned()))
    }

    /// Number of tracked conversations (for monitoring).
    pub fn conversation_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop semaphores for conversations with no turn in flight.
    ///
    /// An entry is live while any clone of its `Arc` is outside the map:
    /// a held permit keeps one, and so does a caller between `semaphore()`
    /// handout and acquisition. Pruning such an entry would let a later
    /// caller mint a second semaphore for the same key and interleave, so
    /// only entries whose sole owner is the map itself are removed.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| Arc::strong_count(sem) > 1);
    }
}
