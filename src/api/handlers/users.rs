//! User search.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::SearchParams;
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::{ChatError, ErrorResponse};
use crate::persistence::UserSummary;

/// `GET /users/search?q=`: Find users by name fragment.
///
/// # Errors
///
/// Returns [`ChatError::InvalidRequest`] for an empty query.
#[utoipa::path(
    get,
    path = "/api/v1/users/search",
    tag = "Users",
    summary = "Search users",
    description = "Case-insensitive substring match on usernames, at most 10 results.",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching users", body = Vec<UserSummary>),
        (status = 400, description = "Empty query", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    )
)]
pub async fn search_users(
    AuthUser(_caller): AuthUser,
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<UserSummary>>, ChatError> {
    Ok(Json(state.users.search(&params.q).await?))
}

/// User routes, nested under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/users/search", get(search_users))
}
