//! End-to-end tests for the auth routes
//!
//! Requests go through the full router (session gate, logging middleware, error
//! rendering) against an in-memory store and a fake OAuth provider.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tower_http::cors::CorsLayer;

use super::models::{OAuthProvider, TokenPurpose, User};
use super::oauth::OAuthClient;
use super::reconcile::tests::FakeProvider;
use super::reset::ResetDelivery;
use super::store::tests::setup_test_store;
use super::tokens::TokenService;
use crate::common::config::ProviderCredentials;
use crate::common::{AppConfig, AppState};

/// Keeps every reset token handed over instead of emailing it
#[derive(Default, Clone)]
struct CapturedResets(Arc<Mutex<Vec<(i64, String)>>>);

#[async_trait::async_trait]
impl ResetDelivery for CapturedResets {
    async fn deliver(&self, user: &User, reset_token: &str) {
        self.0
            .lock()
            .unwrap()
            .push((user.id, reset_token.to_string()));
    }
}

struct TestApp {
    router: Router,
    tokens: TokenService,
    resets: CapturedResets,
}

async fn test_app_with(config: AppConfig, provider: FakeProvider) -> TestApp {
    let config = Arc::new(config);
    let tokens = TokenService::new(&config.jwt_secret, config.token_expiry);
    let resets = CapturedResets::default();

    let state = AppState {
        config: config.clone(),
        store: setup_test_store().await,
        tokens: tokens.clone(),
        oauth: OAuthClient::new(config.clone()),
        provider_api: Arc::new(provider),
        reset_delivery: Arc::new(resets.clone()),
    };

    TestApp {
        router: crate::build_router(Arc::new(state), CorsLayer::new()),
        tokens,
        resets,
    }
}

async fn test_app() -> TestApp {
    test_app_with(AppConfig::for_tests(), FakeProvider::default()).await
}

fn github_config() -> AppConfig {
    let mut config = AppConfig::for_tests();
    config.github = ProviderCredentials {
        client_id: "gh-client".to_string(),
        client_secret: "gh-secret".to_string(),
        redirect_url: "http://localhost:8080/api/auth/github/callback".to_string(),
    };
    config
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn signup_ann(app: &TestApp) -> Value {
    let (status, body) = send(
        app,
        post_json(
            "/api/auth/signup",
            json!({"name": "Ann", "email": "ann@x.com", "password": "secret123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn test_signup_login_and_me() {
    let app = test_app().await;

    let signup = signup_ann(&app).await;
    let token = signup["token"].as_str().unwrap();
    assert_eq!(signup["user"]["email"], "ann@x.com");
    assert_eq!(signup["user"]["name"], "Ann");
    assert!(signup["user"].get("password").is_none());

    let claims = app.tokens.verify(token).unwrap();
    assert_eq!(claims.email, "ann@x.com");
    assert_eq!(claims.user_id, signup["user"]["id"].as_i64().unwrap());

    let (status, login) = send(
        &app,
        post_json(
            "/api/auth/login",
            json!({"email": "ann@x.com", "password": "secret123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["user"]["id"], signup["user"]["id"]);

    let (status, me) = send(
        &app,
        get_with_bearer("/api/auth/me", login["token"].as_str().unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ann@x.com");
    assert!(me["created_at"].is_string());
    assert!(me.get("password").is_none());
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = test_app().await;
    signup_ann(&app).await;

    let (wrong_status, wrong_body) = send(
        &app,
        post_json(
            "/api/auth/login",
            json!({"email": "ann@x.com", "password": "nope"}),
        ),
    )
    .await;
    let (unknown_status, unknown_body) = send(
        &app,
        post_json(
            "/api/auth/login",
            json!({"email": "bob@x.com", "password": "secret123"}),
        ),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_duplicate_signup_is_rejected() {
    let app = test_app().await;
    signup_ann(&app).await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/auth/signup",
            json!({"name": "Ann Again", "email": "ann@x.com", "password": "other"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn test_bad_request_bodies() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        post_json("/api/auth/signup", json!({"email": "ann@x.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = send(
        &app,
        post_json("/api/auth/login", json!({"email": "", "password": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let not_json = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, not_json).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body");
}

#[tokio::test]
async fn test_me_requires_a_valid_bearer_token() {
    let app = test_app().await;

    let (status, body) = send(&app, get("/api/auth/me")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authorization header required");

    let basic = Request::builder()
        .uri("/api/auth/me")
        .header(header::AUTHORIZATION, "Basic abc")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, basic).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid Authorization header format");

    let (status, body) = send(&app, get_with_bearer("/api/auth/me", "garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired token");

    let foreign = TokenService::new("another_secret", std::time::Duration::from_secs(60))
        .issue(1, "ann@x.com")
        .unwrap();
    let (status, _) = send(&app, get_with_bearer("/api/auth/me", &foreign)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_for_missing_user_is_not_found() {
    let app = test_app().await;
    let token = app.tokens.issue(4242, "ghost@x.com").unwrap();

    let (status, body) = send(&app, get_with_bearer("/api/auth/me", &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");
}

#[tokio::test]
async fn test_forgot_password_does_not_reveal_accounts() {
    let app = test_app().await;
    let signup = signup_ann(&app).await;

    let (known_status, known) = send(
        &app,
        post_json("/api/auth/forgot-password", json!({"email": "ann@x.com"})),
    )
    .await;
    let (unknown_status, unknown) = send(
        &app,
        post_json("/api/auth/forgot-password", json!({"email": "bob@x.com"})),
    )
    .await;

    assert_eq!(known_status, StatusCode::OK);
    assert_eq!(unknown_status, StatusCode::OK);
    assert_eq!(known, unknown);
    assert_eq!(known.as_object().unwrap().len(), 1);

    let delivered = app.resets.0.lock().unwrap().clone();
    assert_eq!(delivered.len(), 1);
    let (user_id, reset_token) = &delivered[0];
    assert_eq!(*user_id, signup["user"]["id"].as_i64().unwrap());
    assert!(!known.to_string().contains(reset_token.as_str()));

    let claims = app
        .tokens
        .verify_for(TokenPurpose::PasswordReset, reset_token)
        .unwrap();
    assert_eq!(claims.exp - claims.iat, 15 * 60);

    let (status, body) = send(
        &app,
        post_json("/api/auth/forgot-password", json!({"email": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email is required");
}

#[tokio::test]
async fn test_reset_token_is_not_a_session() {
    let app = test_app().await;
    signup_ann(&app).await;

    let (status, _) = send(
        &app,
        post_json("/api/auth/forgot-password", json!({"email": "ann@x.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let reset_token = app.resets.0.lock().unwrap()[0].1.clone();
    let (status, body) = send(&app, get_with_bearer("/api/auth/me", &reset_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn test_oauth_start_sets_state_cookie_and_redirects() {
    let app = test_app_with(github_config(), FakeProvider::default()).await;

    let response = app
        .router
        .clone()
        .oneshot(get("/api/auth/github"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://github.com/login/oauth/authorize?"));
    assert!(location.contains("client_id=gh-client"));

    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("oauth_state="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=300"));
    assert!(!cookie.contains("Secure"));

    let state = cookie
        .trim_start_matches("oauth_state=")
        .split(';')
        .next()
        .unwrap();
    assert!(location.contains(&format!("state={}", state)));
}

#[tokio::test]
async fn test_oauth_start_unconfigured_or_unknown_provider() {
    let app = test_app().await;

    let (status, body) = send(&app, get("/api/auth/google")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("not configured"));

    let (status, body) = send(&app, get("/api/auth/twitter")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(body["error"], "Unsupported OAuth provider: twitter");

    let (status, body) = send(&app, get("/api/auth/twitter/callback?code=c&state=s")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_oauth_callback_signs_in_and_redirects_with_token() {
    let provider = FakeProvider::default().with(
        "code-1",
        OAuthProvider::GitHub,
        "1001",
        Some("ann@x.com"),
        "Ann",
        None,
    );
    let app = test_app_with(github_config(), provider).await;

    let callback = Request::builder()
        .uri("/api/auth/github/callback?code=code-1&state=abc123")
        .header(header::COOKIE, "theme=dark; oauth_state=abc123")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(callback).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let cleared = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));

    let location = response.headers()[header::LOCATION].to_str().unwrap();
    let token = location
        .strip_prefix("http://localhost:3000/auth/callback?token=")
        .unwrap();

    let (status, me) = send(&app, get_with_bearer("/api/auth/me", token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ann@x.com");
    assert_eq!(me["name"], "Ann");
}

#[tokio::test]
async fn test_oauth_callback_rejects_bad_state_and_missing_code() {
    let provider = FakeProvider::default().with(
        "code-1",
        OAuthProvider::GitHub,
        "1001",
        Some("ann@x.com"),
        "Ann",
        None,
    );
    let app = test_app_with(github_config(), provider).await;

    let mismatched = Request::builder()
        .uri("/api/auth/github/callback?code=code-1&state=abc123")
        .header(header::COOKIE, "oauth_state=zzz")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, mismatched).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid state");

    let (status, _) = send(
        &app,
        get("/api/auth/github/callback?code=code-1&state=abc123"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let no_code = Request::builder()
        .uri("/api/auth/github/callback?state=abc123")
        .header(header::COOKIE, "oauth_state=abc123")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, no_code).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Code is required");

    let denied = Request::builder()
        .uri("/api/auth/github/callback?error=access_denied&state=abc123")
        .header(header::COOKIE, "oauth_state=abc123")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, denied).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oauth_callback_with_unknown_code_fails() {
    let app = test_app_with(github_config(), FakeProvider::default()).await;

    let callback = Request::builder()
        .uri("/api/auth/github/callback?code=stale&state=abc123")
        .header(header::COOKIE, "oauth_state=abc123")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, callback).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to exchange code for token");
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let response = app.router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"OK");
}
