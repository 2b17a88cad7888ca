//! Authentication handlers

use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path, Query},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap,
    },
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::extractors::Principal;
use super::models::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, OAuthCallbackParams, OAuthProvider,
    SignupRequest, TokenPurpose, User,
};
use super::password::verify_password_blocking;
use super::reconcile::IdentityReconciler;
use crate::common::random::generate_oauth_state;
use crate::common::{safe_email_log, ApiError, AppState, Validator};

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_STATE_MAX_AGE_SECS: u64 = 5 * 60;
const FORGOT_PASSWORD_MESSAGE: &str =
    "If your email exists in our system, you will receive a password reset link";
const INVALID_CREDENTIALS: &str = "Invalid email or password";

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        debug!(error = %rejection, "Rejected request body");
        ApiError::BadRequest("Invalid request body".into())
    })
}

/// POST /api/auth/signup
/// Creates a local account and returns a token for it
///
/// # Request Body
/// ```json
/// { "name": "Ann", "email": "ann@x.com", "password": "secret123" }
/// ```
///
/// # Response
/// ```json
/// { "token": "<jwt>", "user": { "id": 1, "name": "Ann", "email": "ann@x.com", ... } }
/// ```
pub async fn signup(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let req = json_body(payload)?;
    req.validate(&req).into_result()?;

    let user = state
        .store
        .create_user(&req.name, &req.email, &req.password)
        .await?;

    let token = state.tokens.issue(user.id, &user.email)?;

    info!(user_id = user.id, email = %safe_email_log(&user.email), "User signed up");
    Ok(Json(AuthResponse { token, user }))
}

/// POST /api/auth/login
/// Password login. Unknown email and wrong password produce the same 401.
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let req = json_body(payload)?;
    req.validate(&req).into_result()?;

    let user = match state.store.get_user_by_email(&req.email).await? {
        Some(user) => user,
        None => {
            debug!(email = %safe_email_log(&req.email), "Login failed: unknown email");
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
    };

    let matches = match verify_password_blocking(req.password, user.password.clone()).await {
        Ok(matches) => matches,
        Err(e) => {
            error!(error = %e, user_id = user.id, "Stored password hash is unreadable");
            false
        }
    };

    if !matches {
        debug!(user_id = user.id, "Login failed: password mismatch");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let token = state.tokens.issue(user.id, &user.email)?;

    info!(user_id = user.id, email = %safe_email_log(&user.email), "User logged in");
    Ok(Json(AuthResponse { token, user }))
}

/// GET /api/auth/me
/// Returns the authenticated user, re-read from the store
pub async fn me_handler(
    Extension(state): Extension<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<User>, ApiError> {
    match state.store.get_user_by_id(principal.user_id).await? {
        Some(user) => Ok(Json(user)),
        None => {
            warn!(user_id = principal.user_id, "Token refers to a user that no longer exists");
            Err(ApiError::NotFound("User not found".into()))
        }
    }
}

/// POST /api/auth/forgot-password
/// Always answers with the same message so callers cannot tell which accounts exist
pub async fn forgot_password(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let req = json_body(payload)?;
    if req.email.trim().is_empty() {
        return Err(ApiError::BadRequest("Email is required".into()));
    }

    match state.store.get_user_by_email(&req.email).await {
        Ok(Some(user)) => {
            let reset_token = state.tokens.issue_for(
                TokenPurpose::PasswordReset,
                user.id,
                &user.email,
                state.config.reset_token_expiry,
            )?;
            state.reset_delivery.deliver(&user, &reset_token).await;
        }
        Ok(None) => {
            debug!(email = %safe_email_log(&req.email), "Password reset for unknown email");
        }
        Err(e) => {
            error!(error = %e, "Password reset lookup failed");
        }
    }

    Ok(Json(serde_json::json!({ "message": FORGOT_PASSWORD_MESSAGE })))
}

fn state_cookie(value: &str, max_age: u64, secure: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        OAUTH_STATE_COOKIE,
        value,
        max_age,
        if secure { "; Secure" } else { "" }
    )
}

fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn parse_provider(raw: &str) -> Result<OAuthProvider, ApiError> {
    raw.parse().map_err(|e: String| {
        debug!(error = %e, "Rejected OAuth provider path");
        ApiError::BadRequest(format!("Unsupported OAuth provider: {}", raw))
    })
}

/// GET /api/auth/:provider
/// Sets the state cookie and redirects to the provider's consent page
pub async fn oauth_start(
    Extension(state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Response, ApiError> {
    let provider = parse_provider(&provider)?;
    let oauth_state = generate_oauth_state();
    let auth_url = state.oauth.authorization_url(provider, &oauth_state)?;
    let secure = state
        .config
        .provider(provider)
        .redirect_url
        .starts_with("https://");

    info!(provider = %provider, "Starting OAuth flow");
    Ok((
        [(
            SET_COOKIE,
            state_cookie(&oauth_state, OAUTH_STATE_MAX_AGE_SECS, secure),
        )],
        Redirect::temporary(&auth_url),
    )
        .into_response())
}

/// GET /api/auth/:provider/callback
/// Validates state, exchanges the code, reconciles the identity and redirects to
/// the frontend with a session token
pub async fn oauth_callback(
    Extension(state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<OAuthCallbackParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let provider = parse_provider(&provider)?;
    if let Some(error) = params.error.as_deref() {
        warn!(provider = %provider, oauth_error = %error, "Provider returned an OAuth error");
        return Err(ApiError::BadRequest("Authorization was not granted".into()));
    }

    let expected = read_cookie(&headers, OAUTH_STATE_COOKIE);
    match (params.state.as_deref(), expected) {
        (Some(received), Some(expected)) if !received.is_empty() && received == expected => {}
        _ => {
            warn!(provider = %provider, "OAuth callback state mismatch");
            return Err(ApiError::BadRequest("Invalid state".into()));
        }
    }

    let code = params
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Code is required".into()))?;

    let access_token = state.provider_api.exchange_code(provider, code).await?;

    let reconciled = IdentityReconciler::new(&state.store)
        .sign_in(state.provider_api.as_ref(), provider, &access_token)
        .await?;

    let token = state
        .tokens
        .issue(reconciled.user.id, &reconciled.user.email)?;

    info!(
        user_id = reconciled.user.id,
        provider = %provider,
        outcome = reconciled.outcome.as_str(),
        "OAuth login successful"
    );

    let redirect_url = format!(
        "{}/auth/callback?token={}",
        state.config.frontend_url.trim_end_matches('/'),
        urlencoding::encode(&token)
    );
    let secure = state
        .config
        .provider(provider)
        .redirect_url
        .starts_with("https://");

    Ok((
        [(SET_COOKIE, state_cookie("", 0, secure))],
        Redirect::temporary(&redirect_url),
    )
        .into_response())
}
