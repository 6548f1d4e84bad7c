//! Test utilities and common setup.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use mantra::config::{Config, LlmApiConfig};
use mantra::routes::create_router;
use mantra::AppState;

/// A test application with tempdir-backed stores.
pub struct TestApp {
    pub router: Router,
    pub data_dir: TempDir,
    pub media_dir: TempDir,
}

/// Create a test application with default configuration.
pub fn test_app() -> TestApp {
    test_app_with_config(Config::default())
}

/// Create a test application with the given configuration.
pub fn test_app_with_config(config: Config) -> TestApp {
    let data_dir = TempDir::new().unwrap();
    let media_dir = TempDir::new().unwrap();

    let state = AppState::new(
        config,
        data_dir.path().to_path_buf(),
        media_dir.path().to_path_buf(),
    );

    TestApp {
        router: create_router(state),
        data_dir,
        media_dir,
    }
}

/// Config pointing the LLM proxy at the given upstream URL.
pub fn llm_config(url: &str) -> Config {
    Config {
        llm_api: LlmApiConfig {
            url: url.to_string(),
            model: "test-model".to_string(),
            ..Default::default()
        },
    }
}

/// POST a JSON body and return status + parsed JSON response.
pub async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .method(Method::POST)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// POST a JSON body and return status + raw text response.
pub async fn post_json_text(router: &Router, uri: &str, body: Value) -> (StatusCode, String) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .method(Method::POST)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// GET a URI and return status + parsed JSON response.
pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
