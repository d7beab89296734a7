//! Chat-completions backend for OpenAI-style servers
//!
//! Covers vLLM, LocalAI, llama-server and hosted endpoints alike. Set
//! `OPENAI_COMPATIBLE_HOST` to enable it; `OPENAI_COMPATIBLE_MODEL` and
//! `OPENAI_COMPATIBLE_API_KEY` are optional.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::{ensure_success, AIBackend, ADVISOR_SYSTEM_PROMPT};

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    client: Client,
    host: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAICompatibleBackend {
    pub fn new(host: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            host: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string()).filter(|k| !k.is_empty());
        self
    }

    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OPENAI_COMPATIBLE_HOST").ok().filter(|h| !h.is_empty())?;
        let model = std::env::var("OPENAI_COMPATIBLE_MODEL")
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let backend = Self::new(&host, &model);
        Some(match std::env::var("OPENAI_COMPATIBLE_API_KEY") {
            Ok(key) => backend.with_api_key(&key),
            Err(_) => backend,
        })
    }

    /// Attach the bearer token, when one is configured
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionReply {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionReply {
    fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
    }
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = CompletionBody {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: ADVISOR_SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.3,
            stream: false,
        };

        let request = self
            .client
            .post(format!("{}/v1/chat/completions", self.host))
            .json(&body);
        let response = self.authorize(request).send().await?;
        let reply: CompletionReply = ensure_success(response, "Chat completion").await?.json().await?;

        let text = reply
            .into_text()
            .ok_or_else(|| Error::Ai("Chat completion returned no message".into()))?;
        debug!(model = %self.model, chars = text.len(), "Chat completion finished");
        Ok(text)
    }

    async fn health_check(&self) -> bool {
        let request = self.client.get(format!("{}/v1/models", self.host));
        self.authorize(request)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_is_optional() {
        let backend = OpenAICompatibleBackend::new("http://localhost:8000/", "gpt-4o-mini")
            .with_api_key("sk-test");
        assert_eq!(backend.host(), "http://localhost:8000");
        assert_eq!(backend.api_key.as_deref(), Some("sk-test"));

        let blank = OpenAICompatibleBackend::new("http://localhost:8000", "m").with_api_key("");
        assert!(blank.api_key.is_none());
    }

    #[test]
    fn test_reply_without_content() {
        let reply: CompletionReply =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(reply.into_text().is_none());

        let empty: CompletionReply = serde_json::from_str("{}").unwrap();
        assert!(empty.into_text().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unhealthy() {
        let backend = OpenAICompatibleBackend::new("http://127.0.0.1:1", DEFAULT_MODEL);
        assert!(!backend.health_check().await);
    }
}
