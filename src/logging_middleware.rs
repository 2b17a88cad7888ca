// src/logging_middleware.rs
//! Middleware for logging request and response bodies in debug mode
//!
//! Credentials are scrubbed before anything is logged: JSON bodies go through
//! [`redact_sensitive`], non-JSON bodies are only reported by size. Request bodies
//! that are too large or of unknown length are passed through without buffering.

use axum::body::{to_bytes, HttpBody};
use axum::{body::Body, extract::Request, http::StatusCode, middleware::Next, response::Response};
use tracing::{debug, Level};

use crate::common::helpers::redact_sensitive;

/// Largest body this middleware will buffer
const MAX_LOGGED_BODY: usize = 1024 * 1024;

fn describe_body(bytes: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(mut json) => {
            redact_sensitive(&mut json);
            json.to_string()
        }
        Err(_) => format!("<{} bytes>", bytes.len()),
    }
}

/// Middleware to log request and response bodies in debug mode
pub async fn log_request_response(request: Request, next: Next) -> Result<Response, StatusCode> {
    if !tracing::enabled!(Level::DEBUG) {
        return Ok(next.run(request).await);
    }

    let request = match request.body().size_hint().upper() {
        Some(len) if len <= MAX_LOGGED_BODY as u64 => {
            let (parts, body) = request.into_parts();
            let bytes = to_bytes(body, MAX_LOGGED_BODY)
                .await
                .map_err(|_| StatusCode::BAD_REQUEST)?;

            if !bytes.is_empty() {
                debug!(
                    method = %parts.method,
                    uri = %parts.uri.path(),
                    request_body = %describe_body(&bytes),
                    "Request"
                );
            }
            Request::from_parts(parts, Body::from(bytes))
        }
        upper => {
            let request_body = match upper {
                Some(len) => format!("<{} bytes, not logged>", len),
                None => "<streamed body, not logged>".to_string(),
            };
            debug!(
                method = %request.method(),
                uri = %request.uri().path(),
                request_body = %request_body,
                "Request"
            );
            request
        }
    };

    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !bytes.is_empty() {
        debug!(
            status = %parts.status,
            response_body = %describe_body(&bytes),
            "Response"
        );
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_body_redacts_credentials() {
        let described = describe_body(br#"{"email":"ann@x.com","password":"secret123"}"#);
        assert!(described.contains("ann@x.com"));
        assert!(!described.contains("secret123"));
        assert!(described.contains("[redacted]"));
    }

    #[test]
    fn test_describe_body_non_json() {
        assert_eq!(describe_body(b"OK"), "<2 bytes>");
    }

    #[tokio::test]
    async fn test_large_body_passes_through_at_debug_level() {
        use axum::{body::Bytes, middleware, routing::post, Router};
        use tower::ServiceExt;

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);
        assert!(tracing::enabled!(Level::DEBUG));

        let app = Router::new()
            .route("/upload", post(|body: Bytes| async move { body.len().to_string() }))
            .layer(middleware::from_fn(log_request_response));

        let size = MAX_LOGGED_BODY + MAX_LOGGED_BODY / 2;
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .body(Body::from(vec![b'a'; size]))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], size.to_string().as_bytes());
    }
}
