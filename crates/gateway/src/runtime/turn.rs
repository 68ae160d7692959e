//! Turn execution — the orchestrator for one request-response unit.
//!
//! Phase order: load/initialize → retrieve → assemble → invoke → update
//! both logs → truncate → persist → hand the transcript out. Truncation
//! bounds what is stored for the next turn, never what is sent in the
//! current one. A failed provider call persists nothing: the store keeps
//! exactly the pre-turn state and the user can retry.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use cc_domain::error::{Error, Result};
use cc_domain::message::{DisplayMessage, Message, Role};
use cc_domain::trace::TraceEvent;
use cc_providers::traits::{PrimingContext, ProviderClient};
use cc_sessions::{compute_session_key, ConversationState};

use crate::state::AppState;

use super::assemble;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / result types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Input to a single turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub conversation_id: String,
    pub user_id: String,
    /// Transcript label for the user; falls back to the user id.
    pub display_name: Option<String>,
    pub message: String,
}

impl TurnRequest {
    fn user_label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.user_id)
    }
}

/// How the turn concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Completed,
    /// Retrieval was unavailable and the turn fell back to plain chat.
    DegradedNoRetrieval,
}

/// The prepared output of a successful turn, handed to the rendering
/// boundary.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    /// Chronological transcript; the renderer reverses it for display.
    pub transcript: Vec<DisplayMessage>,
    pub status: TurnStatus,
    /// Raw provider-facing history, only populated when `turn.debug_history`
    /// is enabled. Never expose this to end users in production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_history: Option<Vec<Message>>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// submit_turn — the main path
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one retrieval-augmented chat turn to completion.
///
/// Serializes behind any in-flight turn for the same `(conversation,
/// user)` key; once the provider call has started the turn runs to
/// completion or failure (no mid-flight cancellation).
pub async fn submit_turn(state: &AppState, req: TurnRequest) -> Result<TurnResult> {
    let session_key = compute_session_key(&req.conversation_id, &req.user_id);
    let turn_start = Instant::now();
    tracing::debug!(session_key = %session_key, "turn started");

    let (binding, provider) = resolve_binding(state, &req.conversation_id)?;
    let priming_ctx = priming_context(&binding.conversation_id, &binding.title, &req);

    // Exclusive ownership of this key's state for the whole turn.
    let _permit = state.locks.acquire(&session_key).await?;

    // ── Load or initialize ───────────────────────────────────────────
    let mut working = match state.store.load(&session_key) {
        Some(existing) => {
            existing.validate()?;
            existing
        }
        None => {
            let priming = provider.generate_priming(&priming_ctx).await?;
            let (created, _is_new) = state.store.initialize(&session_key, priming);
            created
        }
    };
    assemble::ensure_primed(&mut working, provider.as_ref(), &priming_ctx).await?;

    // ── Retrieve ─────────────────────────────────────────────────────
    let (docs, degraded) = match assemble::retrieve(state.retrieval.as_ref(), &req.message, &binding).await
    {
        Ok(docs) => (docs, false),
        Err(e @ Error::RetrievalUnavailable(_)) => {
            if state.config.turn.degrade_on_retrieval_failure {
                tracing::warn!(error = %e, "retrieval unavailable, degrading to plain chat");
                (Vec::new(), true)
            } else {
                return Err(e);
            }
        }
        Err(e) => return Err(e),
    };

    // ── Assemble ─────────────────────────────────────────────────────
    let outcome = assemble::inject(&mut working, &req.message, &docs, req.user_label());

    // ── Invoke ───────────────────────────────────────────────────────
    // The full untruncated history goes out; on failure nothing below
    // runs, so the store still holds the pre-turn state.
    tracing::debug!(
        provider = provider.provider_id(),
        messages = working.history.len(),
        "invoking provider"
    );
    let new_messages = provider.chat(&working.history).await?;

    // ── Update both logs ─────────────────────────────────────────────
    for msg in new_messages {
        if msg.role == Role::Assistant && !msg.content.is_empty() {
            working
                .transcript
                .push(DisplayMessage::now(provider.display_name(), &msg.content));
        }
        working.history.push(msg);
    }

    // ── Truncate ─────────────────────────────────────────────────────
    let before = working.history.len();
    working.history = provider.truncate(&working.history);
    if working.history.len() < before {
        TraceEvent::HistoryTruncated {
            session_key: session_key.clone(),
            before,
            after: working.history.len(),
        }
        .emit();
    }

    // ── Persist ──────────────────────────────────────────────────────
    let transcript = working.transcript.clone();
    let debug_history = state
        .config
        .turn
        .debug_history
        .then(|| working.history.clone());
    state.store.save(&session_key, working);
    state.store.flush()?;

    TraceEvent::TurnCompleted {
        session_key,
        documents: outcome.documents,
        degraded,
        duration_ms: turn_start.elapsed().as_millis() as u64,
    }
    .emit();

    Ok(TurnResult {
        transcript,
        status: if degraded {
            TurnStatus::DegradedNoRetrieval
        } else {
            TurnStatus::Completed
        },
        debug_history,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// restart / cancel — the reset actions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Restart a conversation: re-prime the history and clear the transcript.
pub async fn restart(state: &AppState, conversation_id: &str, user_id: &str) -> Result<()> {
    let session_key = compute_session_key(conversation_id, user_id);
    let (binding, provider) = resolve_binding(state, conversation_id)?;
    let _permit = state.locks.acquire(&session_key).await?;

    let ctx = priming_context_ids(&binding.conversation_id, &binding.title, user_id);
    let priming = provider.generate_priming(&ctx).await?;
    state.store.reset(&session_key, priming);
    state.store.flush()?;
    Ok(())
}

/// Cancel a pending turn: re-prime the history but keep the transcript.
///
/// Asymmetric to [`restart`], which clears both logs. A missing state is
/// initialized instead.
pub async fn cancel(state: &AppState, conversation_id: &str, user_id: &str) -> Result<()> {
    let session_key = compute_session_key(conversation_id, user_id);
    let (binding, provider) = resolve_binding(state, conversation_id)?;
    let _permit = state.locks.acquire(&session_key).await?;

    let ctx = priming_context_ids(&binding.conversation_id, &binding.title, user_id);
    let priming = provider.generate_priming(&ctx).await?;
    if state.store.reset_history(&session_key, priming.clone()).is_none() {
        state.store.initialize(&session_key, priming);
    }
    state.store.flush()?;
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// transcript_view — first-view / read-only path
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Load (priming on first access) the conversation and return its current
/// state without running a turn.
pub async fn transcript_view(
    state: &AppState,
    conversation_id: &str,
    user_id: &str,
) -> Result<ConversationState> {
    let session_key = compute_session_key(conversation_id, user_id);
    let (binding, provider) = resolve_binding(state, conversation_id)?;
    let _permit = state.locks.acquire(&session_key).await?;

    if let Some(existing) = state.store.load(&session_key) {
        return Ok(existing);
    }
    let ctx = priming_context_ids(&binding.conversation_id, &binding.title, user_id);
    let priming = provider.generate_priming(&ctx).await?;
    let (created, _) = state.store.initialize(&session_key, priming);
    state.store.flush()?;
    Ok(created)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn resolve_binding(
    state: &AppState,
    conversation_id: &str,
) -> Result<(cc_domain::config::ConversationBinding, Arc<dyn ProviderClient>)> {
    let binding = state.bindings.resolve(conversation_id)?;
    let provider = state.providers.get(&binding.provider_id).ok_or_else(|| {
        Error::NotFound(format!("provider '{}' is not registered", binding.provider_id))
    })?;
    Ok((binding, provider))
}

fn priming_context(conversation_id: &str, title: &str, req: &TurnRequest) -> PrimingContext {
    PrimingContext {
        conversation_id: conversation_id.to_owned(),
        conversation_title: title.to_owned(),
        user_id: req.user_id.clone(),
        user_display_name: req.user_label().to_owned(),
    }
}

fn priming_context_ids(conversation_id: &str, title: &str, user_id: &str) -> PrimingContext {
    PrimingContext {
        conversation_id: conversation_id.to_owned(),
        conversation_title: title.to_owned(),
        user_id: user_id.to_owned(),
        user_display_name: user_id.to_owned(),
    }
}
