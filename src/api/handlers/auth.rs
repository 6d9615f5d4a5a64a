//! Account handlers: register and login.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{CredentialsRequest, LoginResponse};
use crate::app_state::AppState;
use crate::error::{ChatError, ErrorResponse};
use crate::persistence::UserSummary;

/// `POST /register`: Create an account.
///
/// # Errors
///
/// Returns [`ChatError::InvalidRequest`] for bad input and
/// [`ChatError::Conflict`] for a taken username.
#[utoipa::path(
    post,
    path = "/register",
    tag = "Auth",
    summary = "Register a user",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "User created", body = UserSummary),
        (status = 400, description = "Invalid username or password", body = ErrorResponse),
        (status = 409, description = "Username already taken", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let user = state.users.register(&req.username, &req.password).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /login`: Exchange credentials for an access token.
///
/// # Errors
///
/// Returns [`ChatError::Unauthorized`] on bad credentials.
#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    summary = "Log in",
    description = "Returns a bearer token accepted by every authenticated route and by the `/ws` upgrade (header or `token` query parameter).",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<LoginResponse>, ChatError> {
    let outcome = state.users.login(&req.username, &req.password).await?;
    Ok(Json(LoginResponse {
        access_token: outcome.access_token,
        id: outcome.user.id,
        username: outcome.user.username,
    }))
}

/// Account routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}
