//! Pluggable AI backend abstraction
//!
//! # Architecture
//!
//! - `AIBackend` trait: a single chat completion call plus health and identity
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - `AiInsightGenerator`: prompt building, redaction, deadlines and parsing
//!   on top of any client
//!
//! # Usage
//!
//! ```rust,ignore
//! if let Some(client) = AIClient::from_env() {
//!     let generator = AiInsightGenerator::new(client);
//!     let insights = generator.generate(&dataset, &filters).await?;
//! }
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (openai_compatible, mock). Default: openai_compatible
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible backend)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

mod generator;
mod mock;
mod openai_compatible;
pub mod parsing;
pub mod redact;
pub mod types;

pub use generator::{prompt_vars, AiInsightGenerator};
pub use mock::{MockBackend, MOCK_INSIGHTS_JSON, MOCK_NARRATIVE};
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use async_trait::async_trait;

use crate::error::Result;

/// Trait defining the interface for all AI backends
///
/// Backends only move text. Prompt rendering, redaction and the per-task
/// deadline live in [`AiInsightGenerator`].
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Run one chat completion
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name being used
    fn model(&self) -> &str;

    /// Get the host URL
    fn host(&self) -> &str;

    /// Backend description for status output
    fn info(&self) -> BackendInfo;
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// OpenAI-compatible backend (hosted OpenAI, vLLM, LocalAI, llama-server, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Checks `AI_BACKEND` to determine which backend to use:
    /// - `openai_compatible` (default): Uses OPENAI_COMPATIBLE_HOST and OPENAI_COMPATIBLE_MODEL
    /// - `mock`: Creates a mock backend for testing
    ///
    /// Returns None if the required environment variables are not set.
    pub fn from_env() -> Option<Self> {
        let backend =
            std::env::var("AI_BACKEND").unwrap_or_else(|_| "openai_compatible".to_string());

        match backend.to_lowercase().as_str() {
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(
                    backend = %backend,
                    "Unknown AI_BACKEND, falling back to openai_compatible"
                );
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
        }
    }

    /// Create an OpenAI-compatible backend directly
    pub fn openai_compatible(host: &str, model: &str, api_key: Option<&str>) -> Self {
        let backend = match api_key {
            Some(key) => OpenAICompatibleBackend::with_api_key(host, model, key),
            None => OpenAICompatibleBackend::new(host, model),
        };
        AIClient::OpenAICompatible(backend)
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        match self {
            AIClient::OpenAICompatible(b) => AIClient::OpenAICompatible(b.with_model(model)),
            AIClient::Mock(b) => AIClient::Mock(b.with_model(model)),
        }
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        match self {
            AIClient::OpenAICompatible(b) => b.complete(request).await,
            AIClient::Mock(b) => b.complete(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }

    fn info(&self) -> BackendInfo {
        match self {
            AIClient::OpenAICompatible(b) => b.info(),
            AIClient::Mock(b) => b.info(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_model_keeps_variant() {
        let client = AIClient::mock().with_model("other");
        assert!(matches!(client, AIClient::Mock(_)));
        assert_eq!(client.model(), "other");
        assert_eq!(client.info().backend, "mock");

        let client = AIClient::openai_compatible("http://localhost:8000", "a", Some("sk"));
        assert_eq!(client.with_model("b").model(), "b");
        assert_eq!(client.host(), "http://localhost:8000");
    }
}
