//! Local task and reflection tracker with a streaming LLM proxy.
//!
//! The server persists tasks and reflections in JSON files and proxies
//! `/submit_llm` requests to an upstream chat-completions endpoint,
//! normalizing its SSE token stream for the frontend.

use std::path::PathBuf;
use std::sync::Arc;

pub mod config;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod routes;
pub mod store;

use config::Config;
use store::{ReflectionStore, TaskStore};

/// Application state shared across handlers.
///
/// Configuration is read once at startup and immutable thereafter; the only
/// cross-request state is the two file-backed stores.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tasks: Arc<TaskStore>,
    pub reflections: Arc<ReflectionStore>,
    pub media_dir: PathBuf,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config, data_dir: PathBuf, media_dir: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            tasks: Arc::new(TaskStore::new(data_dir.join("tasks.json"))),
            reflections: Arc::new(ReflectionStore::new(data_dir.join("reflection_data.json"))),
            media_dir,
            http: reqwest::Client::new(),
        }
    }
}
