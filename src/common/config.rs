// src/common/config.rs
//! Environment configuration
//!
//! Everything is read once at startup by [`AppConfig::from_env`]. A `.env` file in
//! the working directory is loaded first when present.

use std::env;
use std::time::Duration;
use tracing::warn;

use crate::auth::models::OAuthProvider;

const DEFAULT_JWT_SECRET: &str = "replace_with_strong_secret";
const DEFAULT_TOKEN_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_RESET_EXPIRY: Duration = Duration::from_secs(15 * 60);

/// Credentials and redirect target for one OAuth provider
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl ProviderCredentials {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub token_expiry: Duration,
    pub reset_token_expiry: Duration,
    pub oauth_http_timeout: Duration,
    pub github: ProviderCredentials,
    pub google: ProviderCredentials,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("JWT_SECRET not set, falling back to the development secret");
                DEFAULT_JWT_SECRET.to_string()
            }
        };

        let frontend_url = env_or("FRONTEND_URL", "http://localhost:3000");
        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .chain(std::iter::once(frontend_url.clone()))
            .collect();

        Self {
            database_url: env_or("DATABASE_URL", "sqlite://auth_api.db"),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(8080),
            frontend_url,
            cors_origins,
            jwt_secret,
            token_expiry: duration_env("JWT_EXPIRY", DEFAULT_TOKEN_EXPIRY),
            reset_token_expiry: duration_env("PASSWORD_RESET_EXPIRY", DEFAULT_RESET_EXPIRY),
            oauth_http_timeout: Duration::from_secs(
                env::var("OAUTH_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(10),
            ),
            github: ProviderCredentials {
                client_id: env_or("GITHUB_CLIENT_ID", ""),
                client_secret: env_or("GITHUB_CLIENT_SECRET", ""),
                redirect_url: env_or(
                    "GITHUB_REDIRECT_URL",
                    "http://localhost:8080/api/auth/github/callback",
                ),
            },
            google: ProviderCredentials {
                client_id: env_or("GOOGLE_CLIENT_ID", ""),
                client_secret: env_or("GOOGLE_CLIENT_SECRET", ""),
                redirect_url: env_or(
                    "GOOGLE_REDIRECT_URL",
                    "http://localhost:8080/api/auth/google/callback",
                ),
            },
        }
    }

    pub fn provider(&self, provider: OAuthProvider) -> &ProviderCredentials {
        match provider {
            OAuthProvider::GitHub => &self.github,
            OAuthProvider::Google => &self.google,
        }
    }

    /// Configuration used by tests: fixed secret, in-memory database, no providers.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        let unconfigured = |name: &str| ProviderCredentials {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: format!("http://localhost:8080/api/auth/{}/callback", name),
        };
        Self {
            database_url: "sqlite::memory:".to_string(),
            port: 0,
            frontend_url: "http://localhost:3000".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
            jwt_secret: "test_secret_key".to_string(),
            token_expiry: DEFAULT_TOKEN_EXPIRY,
            reset_token_expiry: DEFAULT_RESET_EXPIRY,
            oauth_http_timeout: Duration::from_secs(5),
            github: unconfigured("github"),
            google: unconfigured("google"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn duration_env(key: &str, default: Duration) -> Duration {
    match env::var(key) {
        Ok(raw) if !raw.is_empty() => parse_duration(&raw).unwrap_or_else(|| {
            warn!(key = key, value = %raw, "Unparsable duration, using default");
            default
        }),
        _ => default,
    }
}

/// Parses durations such as `24h`, `1h30m`, `90s` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return (secs > 0).then(|| Duration::from_secs(secs));
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in raw.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: u64 = digits.parse().ok()?;
        digits.clear();
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        total = total.checked_add(value.checked_mul(unit)?)?;
    }

    if !digits.is_empty() || total == 0 {
        return None;
    }
    Some(Duration::from_secs(total))
}
