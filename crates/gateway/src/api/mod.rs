pub mod conversations;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(conversations::healthz))
        .route(
            "/v1/conversations/:conversation_id/transcript",
            get(conversations::get_transcript),
        )
        .route(
            "/v1/conversations/:conversation_id/turns",
            post(conversations::submit_turn),
        )
        .route(
            "/v1/conversations/:conversation_id/restart",
            post(conversations::restart_conversation),
        )
        .route(
            "/v1/conversations/:conversation_id/cancel",
            post(conversations::cancel_turn),
        )
}
