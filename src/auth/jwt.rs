//! HS256 access tokens.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::TokenValidator;
use crate::domain::{Identity, UserId};
use crate::error::ChatError;

/// Issuer stamped into and required on every token.
pub const ISSUER: &str = "chat-relay";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    iss: String,
    iat: i64,
    exp: i64,
}

/// Issues and validates access tokens signed with a shared secret.
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    /// Creates a service signing with `secret`; tokens live `ttl_hours`.
    #[must_use]
    pub fn new(secret: &str, ttl_hours: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs: i64::try_from(ttl_hours.saturating_mul(3600)).unwrap_or(i64::MAX),
        }
    }

    /// Signs a token for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Internal`] if signing fails.
    pub fn issue(&self, identity: &Identity) -> Result<String, ChatError> {
        let now = Utc::now().timestamp();
        self.sign(&Claims {
            sub: identity.user_id.to_string(),
            username: identity.username.clone(),
            iss: ISSUER.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, ChatError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| ChatError::Internal(format!("token signing failed: {e}")))
    }
}

impl TokenValidator for JwtService {
    fn validate_token(&self, token: &str) -> Result<Identity, ChatError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| ChatError::Unauthorized(format!("invalid token: {e}")))?;
        let user_id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| ChatError::Unauthorized("invalid token subject".to_string()))?;
        Ok(Identity::new(UserId::new(user_id), data.claims.username))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn bob() -> Identity {
        Identity::new(UserId::new(2), "bob")
    }

    #[test]
    fn issued_token_validates_to_same_identity() {
        let jwt = JwtService::new("secret", 24);
        let Ok(token) = jwt.issue(&bob()) else {
            panic!("issue failed");
        };
        assert_eq!(jwt.validate_token(&token), Ok(bob()));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let Ok(token) = JwtService::new("one", 24).issue(&bob()) else {
            panic!("issue failed");
        };
        assert!(matches!(
            JwtService::new("two", 24).validate_token(&token),
            Err(ChatError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = JwtService::new("secret", 24);
        let now = Utc::now().timestamp();
        let Ok(token) = jwt.sign(&Claims {
            sub: "2".to_string(),
            username: "bob".to_string(),
            iss: ISSUER.to_string(),
            iat: now - 7200,
            exp: now - 3600,
        }) else {
            panic!("sign failed");
        };
        assert!(jwt.validate_token(&token).is_err());
    }

    #[test]
    fn wrong_issuer_and_bad_subject_are_rejected() {
        let jwt = JwtService::new("secret", 24);
        let now = Utc::now().timestamp();
        let claims = |sub: &str, iss: &str| Claims {
            sub: sub.to_string(),
            username: "bob".to_string(),
            iss: iss.to_string(),
            iat: now,
            exp: now + 600,
        };

        let Ok(foreign) = jwt.sign(&claims("2", "someone-else")) else {
            panic!("sign failed");
        };
        assert!(jwt.validate_token(&foreign).is_err());

        let Ok(bad_sub) = jwt.sign(&claims("not-a-number", ISSUER)) else {
            panic!("sign failed");
        };
        assert!(jwt.validate_token(&bad_sub).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let jwt = JwtService::new("secret", 24);
        assert!(jwt.validate_token("not.a.token").is_err());
    }
}
