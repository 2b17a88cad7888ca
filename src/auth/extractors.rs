//! Session gate for protected routes
//!
//! [`require_session`] runs as a route layer: it validates the bearer token and
//! stores a typed [`Principal`] in the request extensions. Handlers take
//! `Principal` as an extractor argument.

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::common::{safe_email_log, ApiError, AppState};

/// Authenticated identity attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub email: String,
}

/// Extracts `<token>` from `Bearer <token>`. Anything other than exactly two
/// space-separated parts with the literal `Bearer` prefix is rejected.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Middleware: verify the bearer token or short-circuit with 401.
pub async fn require_session(
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = match request.headers().get(AUTHORIZATION) {
        Some(value) => value,
        None => {
            warn!("Authentication failed: missing Authorization header");
            return Err(ApiError::Unauthorized(
                "Authorization header required".into(),
            ));
        }
    };

    let token = header.to_str().ok().and_then(parse_bearer).ok_or_else(|| {
        warn!("Authentication failed: malformed Authorization header");
        ApiError::Unauthorized("Invalid Authorization header format".into())
    })?;

    let claims = state.tokens.verify(token).map_err(|e| {
        warn!(reason = %e, "Bearer token rejected");
        ApiError::from(e)
    })?;

    debug!(
        user_id = claims.user_id,
        email = %safe_email_log(&claims.email),
        "Bearer token accepted"
    );

    request.extensions_mut().insert(Principal {
        user_id: claims.user_id,
        email: claims.email,
    });

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Principal>().cloned().ok_or_else(|| {
            warn!("Principal requested on a route without the session gate");
            ApiError::Unauthorized("missing auth".into())
        })
    }
}
