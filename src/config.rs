use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application configuration, loaded once at startup from `config.json`.
///
/// The config is read-only for the process lifetime; handlers receive it
/// through `AppState` as an `Arc<Config>`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Upstream LLM endpoint settings and default sampling parameters.
    #[serde(default)]
    pub llm_api: LlmApiConfig,
}

/// Upstream LLM API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmApiConfig {
    /// Chat-completions endpoint URL.
    #[serde(default)]
    pub url: String,

    /// Model name sent with every upstream request.
    #[serde(default)]
    pub model: String,

    /// Default system message offered to the frontend.
    #[serde(default)]
    pub system_message: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_top_p")]
    pub top_p: f64,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Optional idle timeout (seconds) between upstream stream chunks.
    /// Disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.9
}

fn default_top_k() -> u32 {
    40
}

fn default_max_tokens() -> u32 {
    500
}

impl Default for LlmApiConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            model: String::new(),
            system_message: String::new(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_tokens: default_max_tokens(),
            idle_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load config from a JSON file, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("parsing config file {}", path.display()))?;
            Ok(config)
        } else {
            warn!("Config file not found: {}, using defaults", path.display());
            Ok(Config::default())
        }
    }
}
