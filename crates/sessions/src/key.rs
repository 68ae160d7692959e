//! Session key computation.
//!
//! Key template: `chat:<conversation_id>:<user_id>`. One key uniquely
//! identifies one conversation state; the in-flight turn holding the key's
//! lock owns that state exclusively.

/// Compute a stable session key from the conversation and user ids.
pub fn compute_session_key(conversation_id: &str, user_id: &str) -> String {
    format!("chat:{conversation_id}:{user_id}")
}
