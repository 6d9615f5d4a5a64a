//! Authentication: token validation, password hashing, and the request
//! extractor that turns a token into an [`Identity`].
//!
//! The hub and sessions trust the [`Identity`] produced here without
//! re-validating it.

pub mod jwt;
pub mod password;

use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Uri};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::domain::Identity;
use crate::error::ChatError;

pub use jwt::JwtService;
pub use password::{hash_password, verify_password};

/// Turns an access token into a verified identity.
pub trait TokenValidator: Send + Sync + std::fmt::Debug {
    /// Validates `token` and returns the identity it was issued for.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Unauthorized`] for malformed, forged, or expired
    /// tokens.
    fn validate_token(&self, token: &str) -> Result<Identity, ChatError>;
}

/// Authenticated caller.
///
/// Reads the token from `Authorization: Bearer <token>` or, failing that,
/// from the `token` query parameter, which browsers need because they
/// cannot set headers on WebSocket upgrades.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn query_token(uri: &Uri) -> Option<String> {
    let Query(query) = Query::<TokenQuery>::try_from_uri(uri).ok()?;
    query.token.filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ChatError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| query_token(&parts.uri))
            .ok_or_else(|| ChatError::Unauthorized("missing access token".to_string()))?;
        state.tokens.validate_token(&token).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_header_is_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn query_token_is_parsed() {
        let uri: Uri = "/ws?token=abc".parse().unwrap_or_default();
        assert_eq!(query_token(&uri), Some("abc".to_string()));

        let uri: Uri = "/ws".parse().unwrap_or_default();
        assert_eq!(query_token(&uri), None);

        let uri: Uri = "/ws?token=".parse().unwrap_or_default();
        assert_eq!(query_token(&uri), None);
    }
}
