use cc_domain::error::Result;
use cc_domain::message::Message;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Priming context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Inputs to priming: enough about the conversation and the viewing user
/// that a provider can render its initial system instructions.
#[derive(Debug, Clone, Default)]
pub struct PrimingContext {
    pub conversation_id: String,
    /// Human title of the conversation (course/module name).
    pub conversation_title: String,
    pub user_id: String,
    /// The user's display identity, also used as the transcript label.
    pub user_display_name: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Contract every generative-model adapter must implement.
///
/// The engine sends the full untruncated history on `chat`; `truncate`
/// bounds what is *stored for next time* and is only ever applied after a
/// turn's response has been appended, never before sending.
#[async_trait::async_trait]
pub trait ProviderClient: Send + Sync {
    /// Produce the ordered system messages that prime a fresh conversation.
    async fn generate_priming(&self, ctx: &PrimingContext) -> Result<Vec<Message>>;

    /// Send the history and return only the newly produced messages
    /// (typically one assistant message). Failures surface as
    /// `Error::ProviderUnavailable`; the caller decides whether to retry
    /// and must not persist any state mutated for the failed turn.
    async fn chat(&self, history: &[Message]) -> Result<Vec<Message>>;

    /// Provider-defined reduction of the stored history so it stays within
    /// the provider's input limits. Must be idempotent: applying it to an
    /// already-truncated history converges to the same fixed point.
    fn truncate(&self, history: &[Message]) -> Vec<Message>;

    /// Stable identifier bindings refer to.
    fn provider_id(&self) -> &str;

    /// Display name used as the transcript speaker label.
    fn display_name(&self) -> &str;
}
