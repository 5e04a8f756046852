#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use econote_api::auth::token::{issue_id_token, IdTokenConfig};
use econote_api::config::ServerConfig;
use econote_api::router::build_app_router;
use econote_api::state::AppState;
use econote_api::ws::WsManager;
use econote_assist::{AssistClient, AssistConfig};
use econote_store::MemoryStore;

/// Build a test `ServerConfig` with safe defaults.
///
/// The settings path is unique per call so parallel tests never share a
/// settings file.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        settings_path: std::env::temp_dir()
            .join(format!("econote-settings-{}.json", uuid::Uuid::new_v4())),
        id_token: test_token_config(),
    }
}

pub fn test_token_config() -> IdTokenConfig {
    IdTokenConfig {
        secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
        issuer: "econote-identity".to_string(),
        audience: "econote".to_string(),
    }
}

/// A valid bearer token for the given subject.
pub fn bearer_for(subject: &str) -> String {
    let token =
        issue_id_token(subject, 300, &test_token_config()).expect("token issue should succeed");
    format!("Bearer {token}")
}

/// Build an `AppState` over an in-memory store.
///
/// The assist client points at an unroutable address; assist tests only
/// exercise local validation.
pub fn build_test_state(store: MemoryStore) -> AppState {
    let assist = Arc::new(AssistClient::new(AssistConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        api_key: "test-key".to_string(),
        model: None,
    }));

    AppState {
        store: Arc::new(store),
        assist,
        config: Arc::new(test_config()),
        ws_manager: Arc::new(WsManager::new()),
    }
}

/// Build the full application router over an in-memory store.
///
/// Mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses.
pub fn build_test_app(store: MemoryStore) -> Router {
    let state = build_test_state(store);
    let config = state.config.as_ref().clone();
    build_app_router(state, &config)
}

/// One-shot request against the router, with optional bearer auth and
/// optional JSON body.
pub async fn request(
    app: Router,
    method: Method,
    uri: &str,
    auth: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<axum::body::Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

/// Unauthenticated GET.
pub async fn get(app: Router, uri: &str) -> Response<axum::body::Body> {
    request(app, Method::GET, uri, None, None).await
}

/// Collect and parse a JSON response body.
pub async fn body_json(response: Response<axum::body::Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
