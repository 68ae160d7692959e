//! Session management for CourseChat.
//!
//! Stable per-(conversation, user) session keys, conversation → provider
//! binding resolution, and the file-backed store that owns each
//! conversation's two parallel logs: the provider-facing `history` and the
//! display-only `transcript`.

pub mod identity;
pub mod key;
pub mod state;
pub mod store;

pub use identity::BindingResolver;
pub use key::compute_session_key;
pub use state::ConversationState;
pub use store::ConversationStore;
