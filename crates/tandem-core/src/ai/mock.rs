//! Mock backend for testing
//!
//! Returns canned completions without a server. Can be told to fail, to
//! answer with arbitrary content, or to stall, and records every request it
//! receives so tests can inspect what would have been sent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::types::{BackendInfo, ChatRequest, ChatResponse, TokenUsage};
use super::AIBackend;

/// Canned JSON answer for insight requests
pub const MOCK_INSIGHTS_JSON: &str = r#"{"insights": [
  {"type": "summary", "severity": 1, "title": "Mock comparison", "message": "Group B is broadly in line with group A.", "confidence": 0.9},
  {"type": "trend", "severity": 3, "title": "Mock growth", "message": "The first KPI grew between the two groups.", "confidence": 0.7, "metadata": {"change": 12.5}}
]}"#;

/// Canned text answer for narrative requests
pub const MOCK_NARRATIVE: &str = "Group B performed similarly to group A overall.";

#[derive(Clone)]
enum MockBehavior {
    Canned,
    Respond(String),
    Fail(String),
}

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    model: String,
    behavior: MockBehavior,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    /// Whether health_check should return true
    pub healthy: bool,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Mock that answers with [`MOCK_INSIGHTS_JSON`] or [`MOCK_NARRATIVE`]
    pub fn new() -> Self {
        Self {
            model: "mock".to_string(),
            behavior: MockBehavior::Canned,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            healthy: true,
        }
    }

    /// Mock whose every call fails
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            behavior: MockBehavior::Fail(reason.into()),
            healthy: false,
            ..Self::new()
        }
    }

    /// Mock that answers every call with `content`
    pub fn responding(content: impl Into<String>) -> Self {
        Self {
            behavior: MockBehavior::Respond(content.into()),
            ..Self::new()
        }
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    /// Number of completion calls received, shared across clones
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received so far, shared across clones
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let content = match &self.behavior {
            MockBehavior::Fail(reason) => return Err(Error::AiResponse(reason.clone())),
            MockBehavior::Respond(content) => content.clone(),
            MockBehavior::Canned if request.json_response => MOCK_INSIGHTS_JSON.to_string(),
            MockBehavior::Canned => MOCK_NARRATIVE.to_string(),
        };

        Ok(ChatResponse {
            content,
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            usage: Some(TokenUsage::default()),
        })
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            backend: "mock".to_string(),
            model: self.model.clone(),
            host: self.host().to_string(),
        }
    }
}
