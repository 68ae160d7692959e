//! Prompt assembly — the context-injection policy of one turn.
//!
//! Given the conversation state and a new user query, decides whether to
//! (re-)prime, executes the scoped retrieval, and appends the outbound
//! messages to the history while keeping the transcript projection in
//! step. Injected context never reaches the transcript.

use cc_domain::config::ConversationBinding;
use cc_domain::error::Result;
use cc_domain::message::{DisplayMessage, Message};
use cc_providers::retrieval::{RetrievalClient, RetrievedDocument, SearchScope};
use cc_providers::traits::{PrimingContext, ProviderClient};
use cc_sessions::ConversationState;

/// Fixed instruction prefixed to every injected context block.
const CONTEXT_INSTRUCTION: &str = "Use the following context to answer the question:";

/// What the assembly step did, for status reporting and tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssembleOutcome {
    /// Number of documents folded into the context message (0 = plain chat).
    pub documents: usize,
}

/// Step 1: self-heal priming. If the history is empty (corrupted or
/// freshly created state), regenerate the priming sequence through the
/// bound provider before continuing.
pub async fn ensure_primed(
    state: &mut ConversationState,
    provider: &dyn ProviderClient,
    ctx: &PrimingContext,
) -> Result<bool> {
    if !state.history.is_empty() {
        return Ok(false);
    }
    tracing::info!(session_key = %state.session_key, "history empty, re-priming");
    state.history = provider.generate_priming(ctx).await?;
    Ok(true)
}

/// Build the authorized search scope from the conversation binding. The
/// scope is limited to the binding's corpus ids — user input never widens
/// it.
pub fn build_scope(binding: &ConversationBinding) -> SearchScope {
    SearchScope {
        provider_id: binding.provider_id.clone(),
        corpus_ids: binding.corpus_ids.clone(),
    }
}

/// Step 2: execute the scoped retrieval. Failures propagate typed
/// (`RetrievalUnavailable`); the turn controller owns the recovery policy.
pub async fn retrieve(
    retrieval: &dyn RetrievalClient,
    query: &str,
    binding: &ConversationBinding,
) -> Result<Vec<RetrievedDocument>> {
    let scope = build_scope(binding);
    retrieval
        .search(query, &scope, &binding.user_settings)
        .await
}

/// Step 3: context-injection policy.
///
/// - Zero documents: append exactly one `user` message (plain chat).
/// - One or more: append one `is_context` system message (instruction +
///   one 3-line block per document), then the `user` message.
///
/// The transcript gains exactly one entry either way: the raw query under
/// the user's display label.
pub fn inject(
    state: &mut ConversationState,
    query: &str,
    docs: &[RetrievedDocument],
    user_label: &str,
) -> AssembleOutcome {
    if !docs.is_empty() {
        state.history.push(Message::context(format_context(docs)));
    }
    state.history.push(Message::user(query));
    state
        .transcript
        .push(DisplayMessage::now(user_label, query));

    AssembleOutcome {
        documents: docs.len(),
    }
}

/// Concatenate retrieved documents into the context message body: the
/// fixed instruction, then one `Title:` / `URL:` / content block per
/// document, blocks joined by newline.
fn format_context(docs: &[RetrievedDocument]) -> String {
    let blocks: Vec<String> = docs
        .iter()
        .map(|doc| format!("Title: {}\nURL: {}\n{}", doc.title, doc.source_url, doc.content))
        .collect();
    format!("{CONTEXT_INSTRUCTION}\n{}", blocks.join("\n"))
}
