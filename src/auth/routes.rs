//! Authentication routes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::extractors::require_session;
use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/auth/signup` - Local account signup
/// - `POST /api/auth/login` - Email + password login
/// - `POST /api/auth/forgot-password` - Password reset request
/// - `GET /api/auth/:provider` - Start GitHub/Google OAuth
/// - `GET /api/auth/:provider/callback` - OAuth redirect target
/// - `GET /api/auth/me` - Current user (bearer token required)
pub fn auth_routes() -> Router {
    let protected = Router::new()
        .route("/api/auth/me", get(handlers::me_handler))
        .route_layer(middleware::from_fn(require_session));

    Router::new()
        .route("/api/auth/signup", post(handlers::signup))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/forgot-password", post(handlers::forgot_password))
        .route("/api/auth/:provider", get(handlers::oauth_start))
        .route("/api/auth/:provider/callback", get(handlers::oauth_callback))
        .merge(protected)
}
