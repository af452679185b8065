//! Shared types for AI operations

use serde::{Deserialize, Serialize};

use crate::model_router::TaskType;

/// A single chat completion call, already rendered and redacted
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub task: TaskType,
    pub system: Option<String>,
    pub user: String,
    /// Model override; `None` uses the backend's model
    pub model: Option<String>,
    pub temperature: f32,
    /// Ask the server for a JSON object response
    pub json_response: bool,
}

impl ChatRequest {
    pub fn new(task: TaskType, user: impl Into<String>) -> Self {
        Self {
            task,
            system: None,
            user: user.into(),
            model: None,
            temperature: 0.2,
            json_response: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_response = true;
        self
    }
}

/// Token accounting reported by the server, when it reports any
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Text returned by a completion call
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    /// Model that actually answered
    pub model: String,
    pub usage: Option<TokenUsage>,
}

/// Backend description for health and status output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendInfo {
    pub backend: String,
    pub model: String,
    pub host: String,
}

/// Free-text comparison summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeSummary {
    pub dataset_id: String,
    pub text: String,
    pub model: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}
