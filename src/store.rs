//! JSON-file persistence for tasks and reflections.
//!
//! Both stores follow the same discipline: tolerant load (a missing, empty,
//! or corrupt file reads as an empty document), pretty-printed save, and
//! read-modify-write cycles serialized behind an async mutex so concurrent
//! handlers cannot interleave writes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::LlmApiConfig;

/// System message snapshotted into each new task's recommended settings.
const TASK_SYSTEM_MESSAGE: &str =
    "Generate subtasks, test cases, acceptance criteria, and insights.";

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let Ok(content) = std::fs::read_to_string(path) else {
        return T::default();
    };
    let content = content.trim();
    if content.is_empty() {
        return T::default();
    }
    serde_json::from_str(content).unwrap_or_else(|e| {
        debug!("Ignoring unparseable data file {}: {}", path.display(), e);
        T::default()
    })
}

fn save_pretty<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(data).context("serializing data file")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

// ============================================================================
// Tasks
// ============================================================================

/// Sampling parameters recommended for LLM operations on a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedLlmSettings {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_tokens: u32,
    pub system_message: String,
}

impl Default for RecommendedLlmSettings {
    fn default() -> Self {
        let defaults = LlmApiConfig::default();
        Self {
            temperature: defaults.temperature,
            top_p: defaults.top_p,
            top_k: defaults.top_k,
            max_tokens: defaults.max_tokens,
            system_message: TASK_SYSTEM_MESSAGE.to_string(),
        }
    }
}

/// One tracked task.
///
/// Hand-edited task files may omit fields; everything defaults so a partial
/// document still loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subtasks: Vec<Task>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub acceptance_criteria: Vec<Value>,
    #[serde(default)]
    pub test_cases: Vec<Value>,
    #[serde(default)]
    pub uml_diagram: String,
    #[serde(default)]
    pub ascii_diagram: String,
    #[serde(default)]
    pub additional_info: String,
    #[serde(default)]
    pub related_tasks: Vec<Value>,
    #[serde(default)]
    pub recommended_llm_settings: RecommendedLlmSettings,
}

/// On-disk task document: `{"tasks": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TasksFile {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Partial task update from the frontend; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub subtasks: Option<Vec<Task>>,
    pub acceptance_criteria: Option<Vec<Value>>,
    pub test_cases: Option<Vec<Value>>,
    pub ascii_diagram: Option<String>,
    pub additional_info: Option<String>,
}

/// Task persistence over a single JSON file.
pub struct TaskStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TaskStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Read the whole task document.
    pub async fn list(&self) -> TasksFile {
        let _guard = self.lock.lock().await;
        load_or_default(&self.path)
    }

    /// Get a task by position in the top-level list.
    pub async fn get(&self, index: usize) -> Option<Task> {
        let _guard = self.lock.lock().await;
        let data: TasksFile = load_or_default(&self.path);
        data.tasks.into_iter().nth(index)
    }

    /// Append a new task with recommended settings snapshotted from config.
    pub async fn add(&self, title: &str, defaults: &LlmApiConfig) -> Result<Task> {
        let task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: String::new(),
            subtasks: Vec::new(),
            completed: false,
            acceptance_criteria: Vec::new(),
            test_cases: Vec::new(),
            uml_diagram: String::new(),
            ascii_diagram: String::new(),
            additional_info: String::new(),
            related_tasks: Vec::new(),
            recommended_llm_settings: RecommendedLlmSettings {
                temperature: defaults.temperature,
                top_p: defaults.top_p,
                top_k: defaults.top_k,
                max_tokens: defaults.max_tokens,
                system_message: TASK_SYSTEM_MESSAGE.to_string(),
            },
        };

        let _guard = self.lock.lock().await;
        let mut data: TasksFile = load_or_default(&self.path);
        data.tasks.push(task.clone());
        save_pretty(&self.path, &data)?;
        Ok(task)
    }

    /// Route generated content into a task field selected by hashtag.
    ///
    /// Returns `None` when the index is out of range. Unknown hashtags leave
    /// the task unchanged.
    pub async fn update_by_hashtag(
        &self,
        index: usize,
        hashtag: &str,
        content: &Value,
    ) -> Result<Option<Task>> {
        let _guard = self.lock.lock().await;
        let mut data: TasksFile = load_or_default(&self.path);

        let Some(task) = data.tasks.get_mut(index) else {
            return Ok(None);
        };

        match hashtag {
            "#gentestcases" => {
                if let Some(cases) = content.get("test_cases").and_then(Value::as_array) {
                    task.test_cases = cases.clone();
                }
            }
            "#gencriteria" => {
                if let Some(criteria) = content.get("acceptance_criteria").and_then(Value::as_array)
                {
                    task.acceptance_criteria = criteria.clone();
                }
            }
            "#genuml" => {
                if let Some(diagram) = content.get("uml_diagram").and_then(Value::as_str) {
                    task.uml_diagram = diagram.to_string();
                }
            }
            "#genascii" => {
                if let Some(diagram) = content.get("ascii_diagram").and_then(Value::as_str) {
                    task.ascii_diagram = diagram.to_string();
                }
            }
            "#addnotes" => {
                task.additional_info = content
                    .get("additional_info")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
            }
            other => {
                debug!("Ignoring unknown task hashtag: {}", other);
            }
        }

        let updated = task.clone();
        save_pretty(&self.path, &data)?;
        Ok(Some(updated))
    }

    /// Apply a partial update to the task at `index`.
    pub async fn update_details(&self, index: usize, patch: TaskPatch) -> Result<Option<Task>> {
        let _guard = self.lock.lock().await;
        let mut data: TasksFile = load_or_default(&self.path);

        let Some(task) = data.tasks.get_mut(index) else {
            return Ok(None);
        };

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(subtasks) = patch.subtasks {
            task.subtasks = subtasks;
        }
        if let Some(criteria) = patch.acceptance_criteria {
            task.acceptance_criteria = criteria;
        }
        if let Some(cases) = patch.test_cases {
            task.test_cases = cases;
        }
        if let Some(diagram) = patch.ascii_diagram {
            task.ascii_diagram = diagram;
        }
        if let Some(info) = patch.additional_info {
            task.additional_info = info;
        }

        let updated = task.clone();
        save_pretty(&self.path, &data)?;
        Ok(Some(updated))
    }

    /// Remove the task with the given id. Returns whether anything was
    /// deleted.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut data: TasksFile = load_or_default(&self.path);

        let before = data.tasks.len();
        data.tasks.retain(|t| t.id != id);
        let deleted = data.tasks.len() != before;

        if deleted {
            save_pretty(&self.path, &data)?;
        }
        Ok(deleted)
    }
}

// ============================================================================
// Reflections
// ============================================================================

/// One submitted reflection. Analyzed fields are typed; everything else the
/// frontend sends is preserved as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reflection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// On-disk reflection document: `{"reflections": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReflectionsFile {
    #[serde(default)]
    pub reflections: Vec<Reflection>,
}

/// Aggregated insight summary over all stored reflections.
#[derive(Debug, Clone, Serialize)]
pub struct Insights {
    pub emotional_trends: BTreeMap<String, u64>,
    pub progress_summary: f64,
    pub skills_summary: BTreeMap<String, u64>,
}

/// Reflection persistence over a single JSON file.
pub struct ReflectionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ReflectionStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Append one reflection.
    pub async fn submit(&self, reflection: Reflection) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut data: ReflectionsFile = load_or_default(&self.path);
        data.reflections.push(reflection);
        save_pretty(&self.path, &data)
    }

    /// Compute emotional trends, average task progress, and skill frequency
    /// over everything stored so far.
    pub async fn analyze(&self) -> Insights {
        let _guard = self.lock.lock().await;
        let data: ReflectionsFile = load_or_default(&self.path);

        let mut emotional_trends = BTreeMap::new();
        let mut skills_summary = BTreeMap::new();
        let mut progress_total = 0.0;
        let mut progress_count = 0u64;

        for reflection in &data.reflections {
            if let Some(emotion) = &reflection.emotional_state {
                *emotional_trends.entry(emotion.clone()).or_insert(0) += 1;
            }
            if let Some(progress) = reflection.task_progress {
                progress_total += progress;
                progress_count += 1;
            }
            for skill in &reflection.skills {
                *skills_summary.entry(skill.clone()).or_insert(0) += 1;
            }
        }

        let progress_summary = if progress_count > 0 {
            progress_total / progress_count as f64
        } else {
            0.0
        };

        Insights {
            emotional_trends,
            progress_summary,
            skills_summary,
        }
    }
}
