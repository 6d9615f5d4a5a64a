//! Registration and login payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::UserId;

/// Body of `POST /register` and `POST /login`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    /// Login name, 1 to 50 characters.
    pub username: String,
    /// Plain-text password.
    pub password: String,
}

/// Successful login.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer token for REST calls and the `/ws` upgrade.
    pub access_token: String,
    /// Authenticated user id.
    pub id: UserId,
    /// Authenticated username.
    pub username: String,
}
