//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::common::validation::{is_plausible_email, ValidationResult, Validator};

/// What a token may be used for. Tokens are only accepted for their own purpose.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    PasswordReset,
}

/// JWT claims structure
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub purpose: TokenPurpose,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
}

/// User database model
///
/// `password` holds the PHC hash string and is never serialized.
#[derive(FromRow, Serialize, Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Supported identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum OAuthProvider {
    GitHub,
    Google,
}

impl OAuthProvider {
    pub const ALL: [OAuthProvider; 2] = [OAuthProvider::GitHub, OAuthProvider::Google];

    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::GitHub => "github",
            OAuthProvider::Google => "google",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(OAuthProvider::GitHub),
            "google" => Ok(OAuthProvider::Google),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Link between an external provider account and a local user
#[derive(FromRow, Serialize, Debug, Clone)]
pub struct OAuthAccount {
    pub id: i64,
    pub user_id: i64,
    pub provider: OAuthProvider,
    pub provider_id: String,
    pub provider_data: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Body of `POST /api/auth/signup`
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Validator<SignupRequest> for SignupRequest {
    fn validate(&self, data: &SignupRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.require("name", "Name", &data.name);
        if result.require("email", "Email", &data.email) && !is_plausible_email(&data.email) {
            result.add_error("email", "Email is not a valid address");
        }
        result.require("password", "Password", &data.password);
        result
    }
}

/// Body of `POST /api/auth/login`
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validator<LoginRequest> for LoginRequest {
    fn validate(&self, data: &LoginRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.require("email", "Email", &data.email);
        result.require("password", "Password", &data.password);
        result
    }
}

/// Body of `POST /api/auth/forgot-password`
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Token plus the user it was issued for
#[derive(Serialize, Debug)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Query string the provider appends to the callback redirect
#[derive(Deserialize, Debug, Default)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
