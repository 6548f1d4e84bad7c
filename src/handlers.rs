//! HTTP handlers for tasks, reflections, mantra, audio, and the LLM proxy.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::{ApiError, ApiResult};
use crate::llm::{self, CompletionError, SubmitLlmRequest};
use crate::store::{Insights, Reflection, Task, TaskPatch, TasksFile};
use crate::AppState;

/// Mantra text spoken at the end of the timer.
pub const MANTRA_TEXT: &str = "\nWe are in complete control of our righteous path, manifesting our destiny by focusing on achieving the goals we set for ourselves in our spiritual life, our personal life, and our business life.\n\nBecause we know that at minimum, this human realm is run using machinery that uses templates. And we now know how to manipulate the right templates to execute our divine plan of being in complete control of our righteous path.\n\nNow rate what we accomplished and start a new timer.\n";

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AddTaskRequest {
    pub task: String,
}

#[derive(Debug, Serialize)]
pub struct TaskMessageResponse {
    pub message: &'static str,
    pub task: Value,
}

pub async fn add_task(
    State(state): State<AppState>,
    Json(req): Json<AddTaskRequest>,
) -> ApiResult<Json<TaskMessageResponse>> {
    let task = state.tasks.add(&req.task, &state.config.llm_api).await?;
    info!("Added task: {}", task.title);

    Ok(Json(TaskMessageResponse {
        message: "Task added successfully",
        task: Value::String(task.title),
    }))
}

pub async fn get_tasks(State(state): State<AppState>) -> Json<TasksFile> {
    Json(state.tasks.list().await)
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(task_index): Path<usize>,
) -> ApiResult<Json<Task>> {
    state
        .tasks
        .get(task_index)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Task not found"))
}

/// Hashtag-routed task update carrying generated content.
#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub task_id: usize,
    pub hashtag: String,
    pub response_content: Value,
}

pub async fn update_task(
    State(state): State<AppState>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskMessageResponse>> {
    let updated = state
        .tasks
        .update_by_hashtag(req.task_id, &req.hashtag, &req.response_content)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    Ok(Json(TaskMessageResponse {
        message: "Task updated successfully",
        task: serde_json::to_value(updated).map_err(|e| ApiError::internal(e.to_string()))?,
    }))
}

pub async fn update_task_details(
    State(state): State<AppState>,
    Path(task_id): Path<usize>,
    Json(patch): Json<TaskPatch>,
) -> ApiResult<Json<TaskMessageResponse>> {
    let updated = state
        .tasks
        .update_details(task_id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    Ok(Json(TaskMessageResponse {
        message: "Task updated successfully",
        task: serde_json::to_value(updated).map_err(|e| ApiError::internal(e.to_string()))?,
    }))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    if !state.tasks.delete(&task_id).await? {
        return Err(ApiError::not_found("Task not found"));
    }

    Ok(Json(MessageResponse {
        message: "Task deleted successfully",
    }))
}

// ============================================================================
// Reflections
// ============================================================================

pub async fn submit_reflection(
    State(state): State<AppState>,
    Json(reflection): Json<Reflection>,
) -> ApiResult<Json<MessageResponse>> {
    state.reflections.submit(reflection).await?;

    Ok(Json(MessageResponse {
        message: "Reflection submitted successfully",
    }))
}

pub async fn analyze_reflection(State(state): State<AppState>) -> Json<Insights> {
    Json(state.reflections.analyze().await)
}

// ============================================================================
// Mantra and audio
// ============================================================================

#[derive(Debug, Serialize)]
pub struct MantraResponse {
    pub mantra: &'static str,
}

pub async fn mantra_text() -> Json<MantraResponse> {
    Json(MantraResponse {
        mantra: MANTRA_TEXT,
    })
}

/// Serve one audio file from the media directory.
///
/// Path components are rejected outright so requests cannot escape the media
/// directory.
pub async fn get_audio_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response<Body>> {
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(ApiError::bad_request("Invalid filename"));
    }

    let path = state.media_dir.join(&filename);
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        debug!("Audio file {} not readable: {}", path.display(), e);
        ApiError::not_found("File not found")
    })?;

    let mime = mime_guess::from_path(&path).first_or_octet_stream();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .body(Body::from(bytes))
        .map_err(|e| ApiError::internal(e.to_string()))
}

// ============================================================================
// LLM proxy
// ============================================================================

/// Submit an LLM request, streaming or blocking depending on the payload.
///
/// The body is validated before any upstream call: a missing required field
/// fails fast with 400.
pub async fn submit_llm(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Response<Body>> {
    debug!("Received LLM request: {}", body);

    let req: SubmitLlmRequest = serde_json::from_value(body)
        .map_err(|e| ApiError::bad_request(format!("Missing key in LLM request data: {}", e)))?;

    let llm_config = &state.config.llm_api;
    let chat_request = llm::build_chat_request(llm_config, &req);

    if req.stream {
        let idle_timeout = llm_config
            .idle_timeout_secs
            .map(std::time::Duration::from_secs);
        let events = llm::stream_completion(
            state.http.clone(),
            llm_config.url.clone(),
            idle_timeout,
            chat_request,
        );

        let frames = events.map(|event| Ok::<_, Infallible>(Bytes::from(event.into_frame())));

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .header(header::CACHE_CONTROL, "no-cache")
            .header("X-Accel-Buffering", "no") // Disable nginx buffering if present
            .body(Body::from_stream(frames))
            .map_err(|e| {
                error!("Failed to build streaming response: {}", e);
                ApiError::internal(e.to_string())
            })
    } else {
        let value = llm::complete(&state.http, &llm_config.url, &chat_request)
            .await
            .map_err(|e| match e {
                CompletionError::Transport(msg) => ApiError::bad_gateway(msg),
                CompletionError::InvalidBody => ApiError::internal("Invalid response format"),
            })?;

        Ok(Json(value).into_response())
    }
}
