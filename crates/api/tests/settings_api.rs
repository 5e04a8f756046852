//! Integration tests for the store-settings endpoint.
//!
//! Each test gets its own settings file (a unique temp path from the test
//! config) and removes it afterwards.

mod common;

use std::path::PathBuf;

use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::json;

use common::{bearer_for, body_json, build_test_state, request};
use econote_api::router::build_app_router;
use econote_store::{read_overrides_from, MemoryStore, StoreConfig};

/// Full router plus the settings path its state points at.
fn settings_app() -> (Router, PathBuf) {
    let state = build_test_state(MemoryStore::new());
    let path = state.config.settings_path.clone();
    let config = state.config.as_ref().clone();
    (build_app_router(state, &config), path)
}

#[tokio::test]
async fn updating_settings_persists_the_overrides() {
    let (app, path) = settings_app();

    let response = request(
        app,
        Method::PUT,
        "/api/v1/settings/store",
        Some(&bearer_for("alice")),
        Some(json!({
            "project_id": "econote-staging",
            "api_key": "staging-key",
            "auth_domain": "staging.store.example.com",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The persisted overrides win over any environment on the next load.
    let config = StoreConfig::load_from(&path).unwrap();
    assert_eq!(config.project_id, "econote-staging");
    assert_eq!(config.api_key, "staging-key");
    assert_eq!(config.auth_domain, "staging.store.example.com");

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn saved_settings_are_readable() {
    let (app, path) = settings_app();

    let response = request(
        app.clone(),
        Method::PUT,
        "/api/v1/settings/store",
        Some(&bearer_for("alice")),
        Some(json!({ "project_id": "econote-staging" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = request(
        app,
        Method::GET,
        "/api/v1/settings/store",
        Some(&bearer_for("alice")),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["project_id"], "econote-staging");
    // Keys left to the environment are not present in the overrides.
    assert!(body["data"].get("api_key").is_none());

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn reading_without_a_settings_file_returns_no_overrides() {
    let (app, _path) = settings_app();

    let response = request(
        app,
        Method::GET,
        "/api/v1/settings/store",
        Some(&bearer_for("alice")),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"], json!({}));
}

#[tokio::test]
async fn empty_update_is_rejected() {
    let (app, path) = settings_app();

    let response = request(
        app,
        Method::PUT,
        "/api/v1/settings/store",
        Some(&bearer_for("alice")),
        Some(json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(read_overrides_from(&path).unwrap(), Default::default());
}

#[tokio::test]
async fn settings_require_authentication() {
    let (app, path) = settings_app();

    let response = request(
        app,
        Method::PUT,
        "/api/v1/settings/store",
        None,
        Some(json!({ "project_id": "p" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert!(!path.exists(), "unauthenticated write must not persist");
}
