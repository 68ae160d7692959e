//! Conversation API endpoints.
//!
//! - `GET  /v1/conversations/:id/transcript` — current display transcript
//! - `POST /v1/conversations/:id/turns`      — run one chat turn
//! - `POST /v1/conversations/:id/restart`    — wipe history and transcript
//! - `POST /v1/conversations/:id/cancel`     — reset history, keep transcript

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use cc_domain::error::Error;

use crate::runtime::{self, TurnRequest};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Map a domain error onto an HTTP status plus JSON body.
fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::RetrievalUnavailable(_) | Error::ProviderUnavailable { .. } => {
            StatusCode::BAD_GATEWAY
        }
        Error::TurnInProgress(_) => StatusCode::TOO_MANY_REQUESTS,
        Error::InvalidState(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "request failed");
    }
    api_error(status, err.to_string())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /healthz
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "providers": state.providers.len(),
        "sessions": state.store.keys().len(),
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/conversations/:id/transcript
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

/// Return the display transcript, most recent entry first. Initializes the
/// conversation state on first access.
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Query(q): Query<UserQuery>,
) -> Response {
    match runtime::transcript_view(&state, &conversation_id, &q.user_id).await {
        Ok(conv) => {
            let mut entries = conv.transcript;
            entries.reverse();
            Json(serde_json::json!({
                "conversation_id": conversation_id,
                "state_id": conv.state_id,
                "transcript": entries,
            }))
            .into_response()
        }
        Err(err) => error_response(err),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/conversations/:id/turns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct TurnBody {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub message: String,
}

pub async fn submit_turn(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(body): Json<TurnBody>,
) -> Response {
    let req = TurnRequest {
        conversation_id,
        user_id: body.user_id,
        display_name: body.display_name,
        message: body.message,
    };
    match runtime::submit_turn(&state, req).await {
        Ok(result) => {
            let mut entries = result.transcript;
            entries.reverse();
            Json(serde_json::json!({
                "status": result.status,
                "transcript": entries,
                "debug_history": result.debug_history,
            }))
            .into_response()
        }
        Err(err) => error_response(err),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/conversations/:id/restart  and  /cancel
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ResetBody {
    pub user_id: String,
}

pub async fn restart_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(body): Json<ResetBody>,
) -> Response {
    match runtime::restart(&state, &conversation_id, &body.user_id).await {
        Ok(()) => Json(serde_json::json!({ "restarted": true })).into_response(),
        Err(err) => error_response(err),
    }
}

pub async fn cancel_turn(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(body): Json<ResetBody>,
) -> Response {
    match runtime::cancel(&state, &conversation_id, &body.user_id).await {
        Ok(()) => Json(serde_json::json!({ "cancelled": true })).into_response(),
        Err(err) => error_response(err),
    }
}
