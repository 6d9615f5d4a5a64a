//! Argon2 password hashing.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::ChatError;

/// Hashes `password` with a fresh random salt and returns the PHC string.
///
/// # Errors
///
/// Returns [`ChatError::Internal`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, ChatError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ChatError::Internal(format!("password hashing failed: {e}")))
}

/// Checks `password` against a stored PHC string.
///
/// # Errors
///
/// Returns [`ChatError::Internal`] if the stored hash cannot be parsed.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, ChatError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| ChatError::Internal(format!("stored password hash is invalid: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let Ok(hash) = hash_password("correct horse") else {
            panic!("hashing failed");
        };
        assert!(hash.starts_with("$argon2"));
        assert_eq!(verify_password("correct horse", &hash), Ok(true));
        assert_eq!(verify_password("battery staple", &hash), Ok(false));
    }

    #[test]
    fn salts_differ() {
        let (Ok(a), Ok(b)) = (hash_password("same"), hash_password("same")) else {
            panic!("hashing failed");
        };
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(matches!(
            verify_password("x", "not-a-phc-string"),
            Err(ChatError::Internal(_))
        ));
    }
}
