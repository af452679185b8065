//! Model Router for task-based model settings
//!
//! Each AI task gets its own deadline, sampling temperature and optional model
//! override. Insight extraction sits on the request path of the dashboard, so
//! it runs with a short deadline; narrative summaries are allowed far longer.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/tandem/config/models.toml)
//! 2. Fall back to embedded defaults (compiled into binary)

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/models.toml");

/// Task types for model routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    /// Structured insight list for the dashboard (short deadline)
    InsightExtraction,
    /// Free-text comparison summary (long deadline)
    Narrative,
}

impl TaskType {
    /// Get the config key for this task type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsightExtraction => "insight_extraction",
            Self::Narrative => "narrative",
        }
    }

    /// Get all task types
    pub fn all() -> &'static [TaskType] {
        &[Self::InsightExtraction, Self::Narrative]
    }

    fn from_config_key(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.as_str() == key)
    }
}

/// Configuration for a specific task type
#[derive(Debug, Clone, PartialEq)]
pub struct TaskConfig {
    /// Model override; `None` uses the backend's configured model
    pub model: Option<String>,
    /// Deadline for the whole request
    pub timeout: Duration,
    pub temperature: f32,
}

/// Router configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    pub default_timeout: Duration,
    pub default_temperature: f32,
    /// Per-task configurations
    pub tasks: HashMap<TaskType, TaskConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        let mut tasks = HashMap::new();
        tasks.insert(
            TaskType::InsightExtraction,
            TaskConfig {
                model: None,
                timeout: Duration::from_secs(5),
                temperature: 0.2,
            },
        );
        tasks.insert(
            TaskType::Narrative,
            TaskConfig {
                model: None,
                timeout: Duration::from_secs(120),
                temperature: 0.4,
            },
        );
        Self {
            default_timeout: Duration::from_secs(30),
            default_temperature: 0.2,
            tasks,
        }
    }
}

/// Model Router for task-based model settings
#[derive(Debug, Clone)]
pub struct ModelRouter {
    config: RouterConfig,
    config_path: Option<PathBuf>,
}

impl ModelRouter {
    /// Create a router from the override file or embedded defaults
    pub fn new() -> Result<Self> {
        let config_path = default_config_path();
        let config = load_config(config_path.as_deref())?;
        Ok(Self {
            config,
            config_path,
        })
    }

    /// Create with a custom config path
    pub fn with_config_path(path: PathBuf) -> Result<Self> {
        let config = load_config(Some(&path))?;
        Ok(Self {
            config,
            config_path: Some(path),
        })
    }

    /// Create with an explicit configuration (for testing)
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            config,
            config_path: None,
        }
    }

    /// Get the full task configuration
    pub fn config_for_task(&self, task: TaskType) -> TaskConfig {
        self.config
            .tasks
            .get(&task)
            .cloned()
            .unwrap_or_else(|| TaskConfig {
                model: None,
                timeout: self.config.default_timeout,
                temperature: self.config.default_temperature,
            })
    }

    /// Get the timeout for a task
    pub fn timeout_for_task(&self, task: TaskType) -> Duration {
        self.config_for_task(task).timeout
    }

    /// Model to request for a task, falling back to the backend default
    pub fn model_for_task<'a>(&'a self, task: TaskType, backend_default: &'a str) -> &'a str {
        self.config
            .tasks
            .get(&task)
            .and_then(|c| c.model.as_deref())
            .unwrap_or(backend_default)
    }

    /// Get the router configuration
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Get the config path (if using file-based config)
    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref()
    }

    /// Reload configuration from disk
    pub fn reload(&mut self) -> Result<()> {
        self.config = load_config(self.config_path.as_deref())?;
        Ok(())
    }
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to built-in model config");
            Self::with_config(RouterConfig::default())
        })
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tandem").join("config").join("models.toml"))
}

/// Load configuration (override first, then default)
fn load_config(override_path: Option<&Path>) -> Result<RouterConfig> {
    let content = match override_path {
        Some(path) if path.exists() => fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?,
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    defaults: Option<RawDefaults>,
    tasks: Option<HashMap<String, RawTaskConfig>>,
}

#[derive(Debug, Deserialize)]
struct RawDefaults {
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct RawTaskConfig {
    model: Option<String>,
    timeout_secs: Option<u64>,
    timeout_ms: Option<u64>,
    temperature: Option<f32>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<RouterConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = RouterConfig::default();

    if let Some(defaults) = raw.defaults {
        if let Some(timeout) = defaults.timeout_secs {
            config.default_timeout = Duration::from_secs(timeout);
        }
        if let Some(temperature) = defaults.temperature {
            config.default_temperature = temperature;
        }
    }

    if let Some(tasks) = raw.tasks {
        for (task_name, raw_task) in tasks {
            let Some(task) = TaskType::from_config_key(&task_name) else {
                tracing::debug!(task = %task_name, "Skipping unknown task in model config");
                continue;
            };

            let base = config.tasks.get(&task).cloned().unwrap_or(TaskConfig {
                model: None,
                timeout: config.default_timeout,
                temperature: config.default_temperature,
            });

            // timeout_ms wins over timeout_secs when both are given
            let timeout = raw_task
                .timeout_ms
                .map(Duration::from_millis)
                .or(raw_task.timeout_secs.map(Duration::from_secs))
                .unwrap_or(base.timeout);

            config.tasks.insert(
                task,
                TaskConfig {
                    model: raw_task.model.filter(|m| !m.trim().is_empty()).or(base.model),
                    timeout,
                    temperature: raw_task.temperature.unwrap_or(base.temperature),
                },
            );
        }
    }

    Ok(config)
}
