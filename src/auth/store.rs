//! Credential store: durable `users` and `oauth_accounts` records.
//!
//! Every write is a single-row statement. Email uniqueness and
//! `(provider, provider_id)` uniqueness are enforced by the schema; a writer that
//! loses a race gets [`StoreError::AlreadyExists`] from the failed insert.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, error, info};

use super::models::{OAuthAccount, OAuthProvider, User};
use super::password::{self, PasswordError};
use crate::common::{safe_email_log, ApiError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("password hashing failed: {0}")]
    Password(#[from] PasswordError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyExists("user") => {
                ApiError::BadRequest("user with this email already exists".into())
            }
            StoreError::AlreadyExists(what) => ApiError::BadRequest(format!("{} already exists", what)),
            StoreError::NotFound(what) => {
                let mut label = what.to_string();
                if let Some(first) = label.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                ApiError::NotFound(format!("{} not found", label))
            }
            StoreError::Password(e) => {
                error!(error = %e, "Password hashing failed");
                ApiError::InternalServer("Failed to process credentials".into())
            }
            StoreError::Database(e) => ApiError::DatabaseError(e),
        }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

const USER_COLUMNS: &str = "id, name, email, password, created_at, updated_at";
const OAUTH_COLUMNS: &str =
    "id, user_id, provider, provider_id, provider_data, created_at, updated_at";

/// Handle over the SQLite pool. Cheap to clone; owns no other state.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    pool: SqlitePool,
}

impl CredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Hashes `password` and inserts the user. A taken email is `AlreadyExists("user")`.
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, StoreError> {
        let hashed = password::hash_password_blocking(password.to_string()).await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password) VALUES (?, ?, ?) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(name)
        .bind(email)
        .bind(&hashed)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                debug!(email = %safe_email_log(email), "User insert rejected: email taken");
                StoreError::AlreadyExists("user")
            } else {
                error!(error = %e, email = %safe_email_log(email), "Database error inserting user");
                StoreError::Database(e)
            }
        })?;

        info!(user_id = user.id, email = %safe_email_log(&user.email), "User created");
        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Links a provider identity to `user_id`. The profile payload is written once here
    /// and never updated.
    pub async fn create_oauth_account(
        &self,
        user_id: i64,
        provider: OAuthProvider,
        provider_id: &str,
        provider_data: &str,
    ) -> Result<OAuthAccount, StoreError> {
        let account = sqlx::query_as::<_, OAuthAccount>(&format!(
            "INSERT INTO oauth_accounts (user_id, provider, provider_id, provider_data) \
             VALUES (?, ?, ?, ?) RETURNING {}",
            OAUTH_COLUMNS
        ))
        .bind(user_id)
        .bind(provider)
        .bind(provider_id)
        .bind(provider_data)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                debug!(provider = %provider, provider_id = %provider_id, "OAuth link already exists");
                StoreError::AlreadyExists("oauth account")
            } else {
                error!(
                    error = %e,
                    user_id = user_id,
                    provider = %provider,
                    "Database error inserting OAuth account"
                );
                StoreError::Database(e)
            }
        })?;

        info!(
            user_id = user_id,
            provider = %provider,
            provider_id = %provider_id,
            "OAuth account linked"
        );
        Ok(account)
    }

    /// `Ok(None)` when no link exists; `Err` only for I/O failures.
    pub async fn get_oauth_account(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> Result<Option<OAuthAccount>, StoreError> {
        let account = sqlx::query_as::<_, OAuthAccount>(&format!(
            "SELECT {} FROM oauth_accounts WHERE provider = ? AND provider_id = ?",
            OAUTH_COLUMNS
        ))
        .bind(provider)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    #[cfg(test)]
    pub async fn list_oauth_accounts(&self, user_id: i64) -> Result<Vec<OAuthAccount>, StoreError> {
        let accounts = sqlx::query_as::<_, OAuthAccount>(&format!(
            "SELECT {} FROM oauth_accounts WHERE user_id = ? ORDER BY id",
            OAUTH_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }
}
