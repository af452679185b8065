//! Test utilities for tandem-core
//!
//! This module provides a mock OpenAI-compatible chat completion server that
//! can be used for development and integration tests. It records every
//! request it receives and can be told to stall, fail or answer with garbage.

use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::ai::{MOCK_INSIGHTS_JSON, MOCK_NARRATIVE};

/// How the mock server answers chat completion calls
#[derive(Debug, Clone, PartialEq)]
pub enum MockMode {
    /// Canned insights for JSON requests, canned narrative otherwise
    Canned,
    /// Sleep before answering with the canned content
    Delay(Duration),
    /// Answer with this HTTP status and a short error body
    Status(u16),
    /// 200 with a body that is not a completion envelope
    Garbage,
    /// 200 with an envelope whose message content is this string
    Content(String),
}

/// One request as seen by the mock server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub body: Value,
    pub authorization: Option<String>,
}

impl RecordedRequest {
    /// Concatenated content of every message in the request
    pub fn prompt_text(&self) -> String {
        self.body["messages"]
            .as_array()
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|m| m["content"].as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }
}

#[derive(Clone)]
struct MockState {
    mode: MockMode,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Mock chat completion server for testing and development
pub struct MockChatServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockChatServer {
    /// Start a server that answers with canned content
    pub async fn start() -> Self {
        Self::start_with(MockMode::Canned).await
    }

    /// Start the mock server on an available port
    pub async fn start_with(mode: MockMode) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            mode,
            requests: requests.clone(),
        };

        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Every chat completion request received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockChatServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Model listing (health check)
async fn handle_models() -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{"id": "mock-model", "object": "model"}]
    }))
}

/// Chat completion endpoint
async fn handle_chat(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let wants_json = body["response_format"]["type"] == "json_object";
    let model = body["model"].as_str().unwrap_or("mock-model").to_string();

    state.requests.lock().unwrap().push(RecordedRequest {
        body,
        authorization,
    });

    let canned = if wants_json {
        MOCK_INSIGHTS_JSON
    } else {
        MOCK_NARRATIVE
    };

    match &state.mode {
        MockMode::Canned => completion(&model, canned),
        MockMode::Delay(delay) => {
            tokio::time::sleep(*delay).await;
            completion(&model, canned)
        }
        MockMode::Status(code) => {
            let status = StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(json!({"error": {"message": "mock failure"}}))).into_response()
        }
        MockMode::Garbage => (StatusCode::OK, "<html>definitely not json</html>").into_response(),
        MockMode::Content(content) => completion(&model, content),
    }
}

fn completion(model: &str, content: &str) -> Response {
    Json(json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 42, "completion_tokens": 17, "total_tokens": 59}
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIBackend, ChatRequest, OpenAICompatibleBackend};
    use crate::error::Error;
    use crate::model_router::TaskType;

    fn request() -> ChatRequest {
        ChatRequest::new(TaskType::InsightExtraction, "compare").json()
    }

    #[tokio::test]
    async fn test_mock_server_health_check() {
        let server = MockChatServer::start().await;
        let client = OpenAICompatibleBackend::new(&server.url(), "test-model");

        assert!(client.health_check().await);
    }

    #[tokio::test]
    async fn test_bearer_header_only_with_key() {
        let server = MockChatServer::start().await;

        let anonymous = OpenAICompatibleBackend::with_api_key(&server.url(), "m", "");
        anonymous.complete(&request()).await.unwrap();

        let keyed = OpenAICompatibleBackend::with_api_key(&server.url(), "m", "sk-test");
        keyed.complete(&request()).await.unwrap();

        let requests = server.requests();
        assert_eq!(requests[0].authorization, None);
        assert_eq!(requests[1].authorization.as_deref(), Some("Bearer sk-test"));
    }

    #[tokio::test]
    async fn test_request_shape() {
        let server = MockChatServer::start().await;
        let client = OpenAICompatibleBackend::new(&server.url(), "test-model");

        let response = client
            .complete(&request().with_system("be brief").with_temperature(0.2))
            .await
            .unwrap();
        assert!(response.content.contains("\"insights\""));
        assert_eq!(response.usage.unwrap().total_tokens, 59);

        let body = &server.requests()[0].body;
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "compare");
    }

    #[tokio::test]
    async fn test_error_status_and_garbage_are_ai_errors() {
        for mode in [MockMode::Status(500), MockMode::Status(401), MockMode::Garbage] {
            let server = MockChatServer::start_with(mode.clone()).await;
            let client = OpenAICompatibleBackend::new(&server.url(), "m");

            let err = client.complete(&request()).await.unwrap_err();
            assert!(matches!(err, Error::AiResponse(_)), "{:?}: {}", mode, err);
        }
    }

    #[tokio::test]
    async fn test_empty_content_is_error() {
        let server = MockChatServer::start_with(MockMode::Content("  ".into())).await;
        let client = OpenAICompatibleBackend::new(&server.url(), "m");

        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, Error::AiResponse(_)));
    }
}
