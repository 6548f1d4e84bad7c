//! API route definitions.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        // Tasks
        .route("/add_task", post(handlers::add_task))
        .route("/get_tasks", get(handlers::get_tasks))
        .route("/get_task/:task_index", get(handlers::get_task))
        .route("/update_task", post(handlers::update_task))
        .route(
            "/update_task_details/:task_id",
            post(handlers::update_task_details),
        )
        .route("/delete_task/:task_id", post(handlers::delete_task))
        // Reflections
        .route("/submit_reflection", post(handlers::submit_reflection))
        .route("/analyze_reflection", get(handlers::analyze_reflection))
        // Mantra and audio
        .route("/mantra_text", get(handlers::mantra_text))
        .route("/audio/:filename", get(handlers::get_audio_file))
        // LLM proxy
        .route("/submit_llm", post(handlers::submit_llm))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
