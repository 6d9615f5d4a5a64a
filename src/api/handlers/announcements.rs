//! Broadcast announcements.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::AnnouncementRequest;
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::{ChatPayload, ConversationId};
use crate::error::{ChatError, ErrorResponse};

/// `POST /announcements`: Push a notice to every connected session.
///
/// The notice is delivered live on every instance and is not stored.
///
/// # Errors
///
/// Returns [`ChatError::InvalidRequest`] for empty content or content
/// longer than the session frame limit, and [`ChatError::HubUnavailable`]
/// if the hub has stopped.
#[utoipa::path(
    post,
    path = "/api/v1/announcements",
    tag = "Announcements",
    summary = "Broadcast an announcement",
    description = "Delivers a chat frame with conversation id 0 to every connected session on every instance. Not persisted.",
    request_body = AnnouncementRequest,
    responses(
        (status = 202, description = "Announcement queued"),
        (status = 400, description = "Empty or oversized content", body = ErrorResponse),
        (status = 503, description = "Hub stopped", body = ErrorResponse),
    )
)]
pub async fn announce(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<AnnouncementRequest>,
) -> Result<StatusCode, ChatError> {
    if req.content.trim().is_empty() {
        return Err(ChatError::InvalidRequest("content must not be empty".to_string()));
    }
    let max = state.session.max_message_size;
    if req.content.len() > max {
        return Err(ChatError::InvalidRequest(format!(
            "content is {} bytes, limit is {max}",
            req.content.len()
        )));
    }
    state.hub.announce(&ChatPayload {
        conversation_id: ConversationId::ANNOUNCEMENTS,
        username: caller.username,
        content: req.content,
        sender_id: caller.user_id,
    })?;
    Ok(StatusCode::ACCEPTED)
}

/// Announcement routes, nested under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/announcements", post(announce))
}
