//! Bearer token issuance and verification (HMAC-signed JWT)

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use std::time::Duration;
use thiserror::Error;

use super::models::{Claims, TokenPurpose};
use crate::common::ApiError;

/// Why a token was rejected. Only ever logged; clients see one generic message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("unexpected signing algorithm")]
    WrongAlgorithm,

    #[error("token issued for {actual:?}, expected {expected:?}")]
    WrongPurpose {
        expected: TokenPurpose,
        actual: TokenPurpose,
    },

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotYetValid,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::WrongAlgorithm
            }
            _ => TokenError::Malformed(e.to_string()),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(_) => ApiError::InternalServer("Failed to generate token".into()),
            _ => ApiError::Unauthorized("Invalid or expired token".into()),
        }
    }
}

/// Mints and checks signed, expiring tokens for a `(user_id, email)` principal.
///
/// Stateless: nothing is stored server side, so verification is pure computation.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: Duration,
}

impl TokenService {
    pub fn new(secret: &str, expiry: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry,
        }
    }

    /// Session token valid from now until now + configured expiry.
    pub fn issue(&self, user_id: i64, email: &str) -> Result<String, TokenError> {
        self.issue_for(TokenPurpose::Session, user_id, email, self.expiry)
    }

    /// Token for `purpose` with an explicit lifetime.
    pub fn issue_for(
        &self,
        purpose: TokenPurpose,
        user_id: i64,
        email: &str,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.issue_at(purpose, user_id, email, Utc::now().timestamp(), ttl)
    }

    pub(crate) fn issue_at(
        &self,
        purpose: TokenPurpose,
        user_id: i64,
        email: &str,
        now: i64,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            user_id,
            email: email.to_string(),
            purpose,
            iat: now,
            nbf: now,
            exp: now.saturating_add(ttl),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verifies a session token. Tokens minted for any other purpose are rejected.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_for(TokenPurpose::Session, token)
    }

    /// Checks algorithm family, signature, expiry, not-before and purpose; returns the claims.
    pub fn verify_for(&self, expected: TokenPurpose, token: &str) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Self::validation())?.claims;
        if claims.purpose != expected {
            return Err(TokenError::WrongPurpose {
                expected,
                actual: claims.purpose,
            });
        }
        Ok(claims)
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;
        validation
    }
}
