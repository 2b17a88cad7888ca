//! Password hashing and verification (Argon2id, PHC string format).
//!
//! The stored credential embeds algorithm, cost parameters and salt, e.g.
//! `$argon2id$v=19$m=19456,t=2,p=1$<salt>$<hash>`, so verification needs nothing else.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("stored password hash is not a valid PHC string: {0}")]
    MalformedHash(String),
}

/// Hash a password with a fresh random salt and the default Argon2id parameters.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Check `plain` against a stored PHC hash.
///
/// A wrong password is `Ok(false)`. Only an undecodable stored hash is an error.
pub fn verify_password(plain: &str, stored: &str) -> Result<bool, PasswordError> {
    let parsed =
        PasswordHash::new(stored).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Runs [`hash_password`] on the blocking pool so request tasks are not stalled.
pub async fn hash_password_blocking(plain: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| PasswordError::Hash(e.to_string()))?
}

/// Runs [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(plain: String, stored: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &stored))
        .await
        .map_err(|e| PasswordError::Hash(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("secret123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("secret123", &hash).unwrap());
        assert!(!verify_password("secret124", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_same_password_gets_distinct_hashes() {
        let first = hash_password("secret123").unwrap();
        let second = hash_password("secret123").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("secret123", &first).unwrap());
        assert!(verify_password("secret123", &second).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        let result = verify_password("secret123", "not-a-phc-string");
        assert!(matches!(result, Err(PasswordError::MalformedHash(_))));
    }

    #[tokio::test]
    async fn test_blocking_wrappers() {
        let hash = hash_password_blocking("pw".to_string()).await.unwrap();
        assert!(verify_password_blocking("pw".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password_blocking("nope".to_string(), hash)
            .await
            .unwrap());
    }
}
