// src/main.rs
use axum::{extract::Extension, middleware, routing::get, Router};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// MODULE IMPORTS
// ============================================================================

mod auth;
mod common;
mod logging_middleware;

// ============================================================================
// COMMON IMPORTS
// ============================================================================

use auth::oauth::{provider_http_client, HttpProviderApi, OAuthClient};
use auth::reset::LogResetDelivery;
use auth::store::CredentialStore;
use auth::tokens::TokenService;
use common::{AppConfig, AppState};

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let config = Arc::new(AppConfig::from_env());

    for provider in auth::models::OAuthProvider::ALL {
        if !config.provider(provider).is_configured() {
            warn!(provider = %provider, "OAuth provider credentials missing; its login routes will fail");
        }
    }

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = config.database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options =
        SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    common::migrations::run_migrations(&pool).await?;

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let http_client = provider_http_client(config.oauth_http_timeout)?;

    let app_state = AppState {
        config: config.clone(),
        store: CredentialStore::new(pool.clone()),
        tokens: TokenService::new(&config.jwt_secret, config.token_expiry),
        oauth: OAuthClient::new(config.clone()),
        provider_api: Arc::new(HttpProviderApi::new(http_client, config.clone())),
        reset_delivery: Arc::new(LogResetDelivery),
    };
    info!(
        token_expiry_secs = config.token_expiry.as_secs(),
        "Services initialized"
    );

    let app = build_router(Arc::new(app_state), cors_layer(&config));

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, closing database pool");
    pool.close().await;

    Ok(())
}

// ============================================================================
// ROUTER COMPOSITION
// ============================================================================

pub(crate) fn build_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .merge(auth::auth_routes())
        .route("/health", get(|| async { "OK" }))
        .layer(middleware::from_fn(logging_middleware::log_request_response))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<axum::http::HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::ACCEPT,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .max_age(std::time::Duration::from_secs(300))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down server...");
}
