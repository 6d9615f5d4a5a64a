//! Conversation handlers: private, group, history.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    ConversationResponse, CreateGroupRequest, HistoryParams, StartConversationRequest,
};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::ConversationId;
use crate::error::{ChatError, ErrorResponse};
use crate::persistence::StoredMessage;

/// `POST /conversations`: Find or create a private conversation.
///
/// # Errors
///
/// Returns [`ChatError::InvalidRequest`] if the target is the caller.
#[utoipa::path(
    post,
    path = "/api/v1/conversations",
    tag = "Conversations",
    summary = "Start a private conversation",
    description = "Returns the existing two-person conversation with the target, creating it on first use.",
    request_body = StartConversationRequest,
    responses(
        (status = 200, description = "Conversation ready", body = ConversationResponse),
        (status = 400, description = "Target is the caller", body = ErrorResponse),
        (status = 404, description = "Target user does not exist", body = ErrorResponse),
    )
)]
pub async fn start_private(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<StartConversationRequest>,
) -> Result<Json<ConversationResponse>, ChatError> {
    let conversation_id = state
        .conversations
        .start_private(caller.user_id, req.target_id)
        .await?;
    Ok(Json(ConversationResponse { conversation_id }))
}

/// `POST /conversations/group`: Create a group conversation.
///
/// # Errors
///
/// Returns [`ChatError::InvalidRequest`] if no other member is listed.
#[utoipa::path(
    post,
    path = "/api/v1/conversations/group",
    tag = "Conversations",
    summary = "Create a group conversation",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created", body = ConversationResponse),
        (status = 400, description = "No other members", body = ErrorResponse),
        (status = 404, description = "A member does not exist", body = ErrorResponse),
    )
)]
pub async fn create_group(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let conversation_id = state
        .conversations
        .create_group(caller.user_id, &req.member_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(ConversationResponse { conversation_id })))
}

/// `GET /conversations/{id}/messages`: Latest messages, oldest first.
///
/// # Errors
///
/// Returns [`ChatError::Forbidden`] if the caller is not a member.
#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}/messages",
    tag = "Conversations",
    summary = "Conversation history",
    params(
        ("id" = i64, Path, description = "Conversation id"),
        HistoryParams,
    ),
    responses(
        (status = 200, description = "Messages, oldest first", body = Vec<StoredMessage>),
        (status = 403, description = "Caller is not a member", body = ErrorResponse),
    )
)]
pub async fn history(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<StoredMessage>>, ChatError> {
    let messages = state
        .conversations
        .history(caller.user_id, ConversationId::new(id), params.limit)
        .await?;
    Ok(Json(messages))
}

/// Conversation routes, nested under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/conversations", post(start_private))
        .route("/conversations/group", post(create_group))
        .route("/conversations/{id}/messages", get(history))
}
