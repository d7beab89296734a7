//! Test utilities for subtrack-core
//!
//! A mock AI server speaking both the Ollama (`/api/generate`) and the
//! OpenAI-compatible (`/v1/chat/completions`) protocols, for integration
//! tests that exercise the real HTTP backends.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;

/// Canned insight list returned by default (four valid items)
pub const DEFAULT_INSIGHTS_REPLY: &str = r#"```json
{"insights": [
  {"type": "saving", "message": "Netflix and Hulu overlap; keeping one saves about 10/month.", "affected_services": ["Netflix", "Hulu"], "confidence_score": 0.85},
  {"type": "reminder", "message": "Netflix renews this week.", "affected_services": ["Netflix"], "confidence_score": 0.9},
  {"type": "trend", "message": "Streaming is your largest category.", "affected_services": [], "confidence_score": 0.8},
  {"type": "suggestion", "message": "Switch Spotify to annual billing to save two months.", "affected_services": ["Spotify"], "confidence_score": 0.6}
]}
```"#;

/// What the mock server answers to generation requests
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Reply 200 with this text as the model output
    Text(String),
    /// Reply 500
    ServerError,
}

#[derive(Clone)]
struct MockState {
    reply: MockReply,
    calls: Arc<AtomicUsize>,
}

/// Mock AI server for tests
pub struct MockAIServer {
    addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockAIServer {
    /// Start with the default insight reply on an available port
    pub async fn start() -> Self {
        Self::start_with(MockReply::Text(DEFAULT_INSIGHTS_REPLY.to_string())).await
    }

    /// Start with a specific reply
    pub async fn start_with(reply: MockReply) -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        let state = MockState {
            reply,
            calls: calls.clone(),
        };

        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
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
            calls,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of generation requests received
    pub fn generate_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockAIServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Deserialize)]
struct GenerateRequest {
    model: String,
    #[allow(dead_code)]
    prompt: String,
}

#[derive(Deserialize)]
struct ChatRequest {
    model: String,
}

async fn handle_tags() -> Json<serde_json::Value> {
    Json(json!({ "models": [{ "name": "llama3.2:latest" }] }))
}

async fn handle_models() -> Json<serde_json::Value> {
    Json(json!({ "object": "list", "data": [{ "id": "mock-model" }] }))
}

async fn handle_generate(
    State(state): State<MockState>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    state.calls.fetch_add(1, Ordering::SeqCst);
    match state.reply {
        MockReply::Text(text) => Json(json!({
            "model": request.model,
            "response": text,
            "done": true,
        }))
        .into_response(),
        MockReply::ServerError => {
            (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response()
        }
    }
}

async fn handle_chat(State(state): State<MockState>, Json(request): Json<ChatRequest>) -> Response {
    state.calls.fetch_add(1, Ordering::SeqCst);
    match state.reply {
        MockReply::Text(text) => Json(json!({
            "model": request.model,
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": text } }],
        }))
        .into_response(),
        MockReply::ServerError => {
            (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIBackend, OllamaBackend, OpenAICompatibleBackend};

    #[tokio::test]
    async fn test_mock_server_ollama_protocol() {
        let server = MockAIServer::start().await;
        let backend = OllamaBackend::new(&server.url(), "llama3.2");

        assert!(backend.health_check().await);
        let insights = backend.generate_insights("prompt").await.unwrap();
        assert_eq!(insights.len(), 4);
        assert_eq!(server.generate_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_server_openai_protocol() {
        let server = MockAIServer::start().await;
        let backend = OpenAICompatibleBackend::new(&server.url(), "mock-model");

        assert!(backend.health_check().await);
        let insights = backend.generate_insights("prompt").await.unwrap();
        assert_eq!(insights[0].affected_services, vec!["Netflix", "Hulu"]);
    }

    #[tokio::test]
    async fn test_mock_server_error() {
        let server = MockAIServer::start_with(MockReply::ServerError).await;
        let backend = OllamaBackend::new(&server.url(), "llama3.2");
        assert!(backend.generate("prompt").await.is_err());
    }
}
