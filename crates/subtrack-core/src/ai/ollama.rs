//! Local models served by Ollama
//!
//! Uses the one-shot `/api/generate` endpoint with `format: "json"`, which
//! keeps small models from wrapping the insight list in chatter.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

use super::{ensure_success, AIBackend, ADVISOR_SYSTEM_PROMPT};

const DEFAULT_MODEL: &str = "llama3.2";

#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    host: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(host: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            host: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// `OLLAMA_HOST` selects the server; `OLLAMA_MODEL` overrides the model
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok().filter(|h| !h.is_empty())?;
        let model = std::env::var("OLLAMA_MODEL")
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Some(Self::new(&host, &model))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    format: &'a str,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Debug, Serialize)]
struct SamplingOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    response: String,
}

#[async_trait]
impl AIBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = GenerateBody {
            model: &self.model,
            system: ADVISOR_SYSTEM_PROMPT,
            prompt,
            format: "json",
            stream: false,
            options: SamplingOptions { temperature: 0.3 },
        };

        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&body)
            .send()
            .await?;
        let reply: GenerateReply = ensure_success(response, "Ollama").await?.json().await?;

        debug!(
            model = %self.model,
            chars = reply.response.len(),
            "Ollama completed insight prompt"
        );
        Ok(reply.response)
    }

    async fn health_check(&self) -> bool {
        self.client
            .get(self.url("/api/tags"))
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
