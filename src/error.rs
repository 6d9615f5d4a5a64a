//! Relay error types with HTTP status code mapping.
//!
//! [`ChatError`] is the central error type for the relay. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "unauthorized: missing authentication token",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see [`ChatError`] code ranges).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                          |
/// |-----------|-------------------|--------------------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request                      |
/// | 2000–2999 | Auth / State      | 401 / 403 / 404 / 409                |
/// | 3000–3999 | Server            | 500 Internal Server Error / 503      |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing, malformed, or expired credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated caller is not allowed to access the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Distributed bus failure (publish, subscribe, or connect).
    #[error("bus error: {0}")]
    Bus(String),

    /// The hub event loop is no longer running.
    #[error("hub unavailable")]
    HubUnavailable,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Unauthorized(_) => 2001,
            Self::Forbidden(_) => 2002,
            Self::NotFound(_) => 2003,
            Self::Conflict(_) => 2004,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Bus(_) => 3002,
            Self::HubUnavailable => 3003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Persistence(_) | Self::Bus(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::HubUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn codes_fall_in_their_ranges() {
        assert_eq!(ChatError::InvalidRequest(String::new()).error_code(), 1001);
        assert_eq!(ChatError::Unauthorized(String::new()).error_code(), 2001);
        assert_eq!(ChatError::HubUnavailable.error_code(), 3003);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            ChatError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ChatError::Persistence("db down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ChatError::HubUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn into_response_has_json_body() {
        let response = ChatError::Conflict("username taken".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body read failed");
        };
        let Ok(json) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
            panic!("body is not json");
        };
        assert_eq!(json["error"]["code"], 2004);
        assert!(
            json["error"]["message"]
                .as_str()
                .unwrap_or_default()
                .contains("username taken")
        );
    }
}
