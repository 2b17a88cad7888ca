//! OAuth 2.0 provider plumbing for GitHub and Google
//!
//! - [`OAuthClient`] builds authorization URLs for the configured providers.
//! - [`ProviderApi`] is everything that talks to a provider after the redirect:
//!   code exchange and the "who is this access token" lookups the reconciliation
//!   engine depends on. [`HttpProviderApi`] implements it against the real
//!   provider APIs; tests substitute their own.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::models::OAuthProvider;
use crate::common::{ApiError, AppConfig};

const USER_AGENT: &str = concat!("auth_api/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("{0} OAuth is not configured")]
    NotConfigured(OAuthProvider),

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("provider returned HTTP {status}: {body}")]
    ProviderStatus { status: u16, body: String },

    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl From<OAuthError> for ApiError {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::NotConfigured(provider) => {
                warn!(provider = %provider, "OAuth provider requested but not configured");
                ApiError::InternalServer(format!("{} login is not configured", provider))
            }
            OAuthError::Exchange(detail) => {
                error!(error = %detail, "OAuth code exchange failed");
                ApiError::InternalServer("Failed to exchange code for token".into())
            }
            other => {
                error!(error = %other, "OAuth provider lookup failed");
                ApiError::InternalServer("Failed to get user info".into())
            }
        }
    }
}

/// Fixed endpoints and scopes per provider
struct ProviderEndpoints {
    authorize_url: &'static str,
    token_url: &'static str,
    scopes: &'static [&'static str],
}

fn endpoints(provider: OAuthProvider) -> ProviderEndpoints {
    match provider {
        OAuthProvider::GitHub => ProviderEndpoints {
            authorize_url: "https://github.com/login/oauth/authorize",
            token_url: "https://github.com/login/oauth/access_token",
            scopes: &["user:email"],
        },
        OAuthProvider::Google => ProviderEndpoints {
            authorize_url: "https://accounts.google.com/o/oauth2/auth",
            token_url: "https://oauth2.googleapis.com/token",
            scopes: &[
                "https://www.googleapis.com/auth/userinfo.email",
                "https://www.googleapis.com/auth/userinfo.profile",
            ],
        },
    }
}

/// Builds the shared HTTP client used for every provider call.
pub fn provider_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Authorization URL builder for the configured providers
#[derive(Clone)]
pub struct OAuthClient {
    config: Arc<AppConfig>,
}

impl OAuthClient {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    pub fn authorization_url(
        &self,
        provider: OAuthProvider,
        state: &str,
    ) -> Result<String, OAuthError> {
        let creds = self.config.provider(provider);
        if !creds.is_configured() {
            return Err(OAuthError::NotConfigured(provider));
        }
        let endpoints = endpoints(provider);
        let scope_param = endpoints.scopes.join(" ");

        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            endpoints.authorize_url,
            urlencoding::encode(&creds.client_id),
            urlencoding::encode(&creds.redirect_url),
            urlencoding::encode(&scope_param),
            urlencoding::encode(state),
        );

        debug!(provider = %provider, scopes = %scope_param, "Generated OAuth authorization URL");
        Ok(auth_url)
    }
}

/// Identity as reported by a provider, before reconciliation
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub provider: OAuthProvider,
    pub subject_id: String,
    /// `None` when the provider keeps the address private
    pub email: Option<String>,
    pub name: String,
    /// Raw profile JSON, stored once on the linked account
    pub raw: Value,
}

/// Calls made to a provider once the user has been redirected back
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Exchanges the callback `code` for a provider access token.
    async fn exchange_code(&self, provider: OAuthProvider, code: &str)
        -> Result<String, OAuthError>;

    async fn fetch_profile(
        &self,
        provider: OAuthProvider,
        access_token: &str,
    ) -> Result<ProviderProfile, OAuthError>;

    /// Verified primary address, for providers that can hide it from the profile.
    async fn fetch_verified_primary_email(
        &self,
        provider: OAuthProvider,
        access_token: &str,
    ) -> Result<Option<String>, OAuthError>;
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    email: Option<String>,
    name: Option<String>,
}

/// [`ProviderApi`] over the GitHub and Google REST APIs
#[derive(Clone)]
pub struct HttpProviderApi {
    http: Client,
    config: Arc<AppConfig>,
}

impl HttpProviderApi {
    pub fn new(http: Client, config: Arc<AppConfig>) -> Self {
        Self { http, config }
    }

    async fn get_json(&self, url: &str, access_token: &str) -> Result<Value, OAuthError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| OAuthError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::ProviderStatus {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| OAuthError::Decode(e.to_string()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[async_trait]
impl ProviderApi for HttpProviderApi {
    async fn exchange_code(
        &self,
        provider: OAuthProvider,
        code: &str,
    ) -> Result<String, OAuthError> {
        let creds = self.config.provider(provider);
        if !creds.is_configured() {
            return Err(OAuthError::NotConfigured(provider));
        }

        let params = [
            ("code", code),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("redirect_uri", creds.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ];

        debug!(provider = %provider, "Exchanging authorization code for tokens");

        let response = self
            .http
            .post(endpoints(provider).token_url)
            .header(header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OAuthError::Exchange(format!("HTTP {}: {}", status, body)));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))?;

        match token.access_token {
            Some(access_token) if !access_token.is_empty() => Ok(access_token),
            _ => Err(OAuthError::Exchange(format!(
                "{}: {}",
                token.error.unwrap_or_else(|| "no access_token".to_string()),
                token.error_description.unwrap_or_default()
            ))),
        }
    }

    async fn fetch_profile(
        &self,
        provider: OAuthProvider,
        access_token: &str,
    ) -> Result<ProviderProfile, OAuthError> {
        match provider {
            OAuthProvider::GitHub => {
                let raw = self.get_json("https://api.github.com/user", access_token).await?;
                let user: GitHubUser = serde_json::from_value(raw.clone())
                    .map_err(|e| OAuthError::Decode(e.to_string()))?;
                Ok(ProviderProfile {
                    provider,
                    subject_id: user.id.to_string(),
                    email: non_empty(user.email),
                    name: non_empty(user.name).unwrap_or(user.login),
                    raw,
                })
            }
            OAuthProvider::Google => {
                let raw = self
                    .get_json("https://www.googleapis.com/oauth2/v2/userinfo", access_token)
                    .await?;
                let user: GoogleUser = serde_json::from_value(raw.clone())
                    .map_err(|e| OAuthError::Decode(e.to_string()))?;
                Ok(ProviderProfile {
                    provider,
                    subject_id: user.id,
                    email: non_empty(user.email),
                    name: non_empty(user.name).unwrap_or_default(),
                    raw,
                })
            }
        }
    }

    async fn fetch_verified_primary_email(
        &self,
        provider: OAuthProvider,
        access_token: &str,
    ) -> Result<Option<String>, OAuthError> {
        match provider {
            OAuthProvider::GitHub => {
                let raw = self
                    .get_json("https://api.github.com/user/emails", access_token)
                    .await?;
                let emails: Vec<GitHubEmail> =
                    serde_json::from_value(raw).map_err(|e| OAuthError::Decode(e.to_string()))?;
                Ok(emails
                    .into_iter()
                    .find(|e| e.primary && e.verified)
                    .map(|e| e.email))
            }
            // Google's userinfo already carries the account address
            OAuthProvider::Google => Ok(None),
        }
    }
}
