//! API integration tests for tasks, reflections, mantra, and audio.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{get_json, post_json, test_app};

/// Test that the health endpoint works.
#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();

    let (status, body) = get_json(&app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

/// Adding a task persists it and get_tasks returns it.
#[tokio::test]
async fn test_add_and_list_tasks() {
    let app = test_app();

    let (status, body) = post_json(&app.router, "/add_task", json!({"task": "Ship it"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task added successfully");
    assert_eq!(body["task"], "Ship it");

    let (status, body) = get_json(&app.router, "/get_tasks").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tasks"].as_array().unwrap().len(), 1);
    assert_eq!(body["tasks"][0]["title"], "Ship it");
    assert_eq!(body["tasks"][0]["completed"], false);
    // New tasks snapshot the recommended LLM settings from config defaults.
    assert_eq!(
        body["tasks"][0]["recommended_llm_settings"]["temperature"],
        0.7
    );
}

#[tokio::test]
async fn test_get_task_by_index() {
    let app = test_app();
    post_json(&app.router, "/add_task", json!({"task": "first"})).await;
    post_json(&app.router, "/add_task", json!({"task": "second"})).await;

    let (status, body) = get_json(&app.router, "/get_task/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "second");

    let (status, _) = get_json(&app.router, "/get_task/5").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_task_by_hashtag() {
    let app = test_app();
    post_json(&app.router, "/add_task", json!({"task": "with criteria"})).await;

    let (status, body) = post_json(
        &app.router,
        "/update_task",
        json!({
            "task_id": 0,
            "hashtag": "#gencriteria",
            "response_content": {"acceptance_criteria": ["compiles", "passes tests"]}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task updated successfully");
    assert_eq!(
        body["task"]["acceptance_criteria"],
        json!(["compiles", "passes tests"])
    );

    // Out-of-range task id is a 404.
    let (status, _) = post_json(
        &app.router,
        "/update_task",
        json!({"task_id": 9, "hashtag": "#addnotes", "response_content": {}}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_task_details_partial() {
    let app = test_app();
    post_json(&app.router, "/add_task", json!({"task": "details"})).await;

    let (status, body) = post_json(
        &app.router,
        "/update_task_details/0",
        json!({"description": "now with details", "additional_info": "notes"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["title"], "details");
    assert_eq!(body["task"]["description"], "now with details");
    assert_eq!(body["task"]["additional_info"], "notes");
}

#[tokio::test]
async fn test_delete_task_by_id() {
    let app = test_app();
    post_json(&app.router, "/add_task", json!({"task": "doomed"})).await;

    let (_, body) = get_json(&app.router, "/get_task/0").await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = post_json(&app.router, &format!("/delete_task/{}", id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task deleted successfully");

    let (_, body) = get_json(&app.router, "/get_tasks").await;
    assert!(body["tasks"].as_array().unwrap().is_empty());

    // Deleting again is a 404.
    let (status, _) = post_json(&app.router, &format!("/delete_task/{}", id), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reflections_submit_and_analyze() {
    let app = test_app();

    for (emotion, progress) in [("focused", 80), ("focused", 40), ("tired", 60)] {
        let (status, body) = post_json(
            &app.router,
            "/submit_reflection",
            json!({
                "emotional_state": emotion,
                "task_progress": progress,
                "skills": ["rust"]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Reflection submitted successfully");
    }

    let (status, body) = get_json(&app.router, "/analyze_reflection").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["emotional_trends"]["focused"], 2);
    assert_eq!(body["emotional_trends"]["tired"], 1);
    assert_eq!(body["progress_summary"], 60.0);
    assert_eq!(body["skills_summary"]["rust"], 3);
}

#[tokio::test]
async fn test_mantra_text() {
    let app = test_app();

    let (status, body) = get_json(&app.router, "/mantra_text").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["mantra"]
        .as_str()
        .unwrap()
        .contains("righteous path"));
}

#[tokio::test]
async fn test_audio_file_serving() {
    let app = test_app();
    std::fs::write(app.media_dir.path().join("chime.wav"), b"RIFFfake").unwrap();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/audio/chime.wav")
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("audio/"));
    let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&bytes[..], b"RIFFfake");
}

#[tokio::test]
async fn test_audio_file_not_found() {
    let app = test_app();

    let (status, _) = get_json(&app.router, "/audio/missing.wav").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
