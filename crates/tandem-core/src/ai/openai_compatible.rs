//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API:
//! hosted OpenAI, vLLM, LocalAI, llama-server, Docker Model Runner, etc.
//!
//! # Configuration
//!
//! Environment variables:
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key; blank or unset sends no auth header

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::types::{BackendInfo, ChatRequest, ChatResponse, TokenUsage};
use super::AIBackend;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible backend
///
/// ```rust,ignore
/// // Hosted endpoint
/// export OPENAI_COMPATIBLE_HOST="https://api.openai.com"
/// export OPENAI_COMPATIBLE_API_KEY="sk-..."
///
/// // Self-hosted vLLM, no auth
/// export OPENAI_COMPATIBLE_HOST="http://192.168.1.100:8000"
/// export OPENAI_COMPATIBLE_MODEL="meta-llama/Llama-3.2-3B-Instruct"
/// ```
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
        }
    }

    /// Create with an API key; a blank key means no authentication
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        let mut backend = Self::new(base_url, model);
        backend.api_key = normalize_key(Some(api_key.to_string()));
        backend
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    /// Create from environment variables
    ///
    /// Required: `OPENAI_COMPATIBLE_HOST`
    /// Optional: `OPENAI_COMPATIBLE_MODEL` (default: gpt-4o-mini)
    /// Optional: `OPENAI_COMPATIBLE_API_KEY`
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OPENAI_COMPATIBLE_HOST").ok()?;
        let model =
            std::env::var("OPENAI_COMPATIBLE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let mut backend = Self::new(&host, &model);
        backend.api_key = normalize_key(std::env::var("OPENAI_COMPATIBLE_API_KEY").ok());
        Some(backend)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Make a chat completion request
    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.user.clone(),
        });

        let body = ChatCompletionRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            messages,
            response_format: request.json_response.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
            temperature: Some(request.temperature),
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::AiResponse(format!(
                "OpenAI API error {}: {}",
                status,
                truncate(&text, 200)
            )));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Err(Error::AiResponse("Empty response body".into()));
        }

        let chat_response: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| Error::AiResponse(format!("Malformed completion envelope: {}", e)))?;

        if let Some(usage) = chat_response.usage {
            debug!(
                task = request.task.as_str(),
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Chat completion token usage"
            );
        }

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::AiResponse("No content in completion response".into()))?;

        Ok(ChatResponse {
            content,
            model: chat_response.model.unwrap_or_else(|| body.model.clone()),
            usage: chat_response.usage,
        })
    }
}

fn normalize_key(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

/// Shorten text for logs and error messages, on a char boundary
pub(crate) fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

/// Chat message
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

/// Chat completion choice
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

/// Chat response message
#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.chat_completion(request).await
    }

    async fn health_check(&self) -> bool {
        let mut req = self
            .http_client
            .get(format!("{}/v1/models", self.base_url))
            .timeout(std::time::Duration::from_secs(5));
        if let Some(ref api_key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }
        matches!(req.send().await, Ok(r) if r.status().is_success())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            backend: "openai_compatible".to_string(),
            model: self.model.clone(),
            host: self.base_url.clone(),
        }
    }
}
