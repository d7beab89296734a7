//! Language-model backends for subscription insights
//!
//! The insight engine sends one prompt describing the user's subscriptions
//! and expects a JSON list of insights back. `AIClient` wraps whichever
//! backend `AI_BACKEND` selects:
//!
//! | `AI_BACKEND`          | backend                      | required env             |
//! |-----------------------|------------------------------|--------------------------|
//! | `ollama` (default)    | [`OllamaBackend`]            | `OLLAMA_HOST`            |
//! | `openai_compatible`   | [`OpenAICompatibleBackend`]  | `OPENAI_COMPATIBLE_HOST` |
//! | `mock`                | [`MockBackend`]              | none                     |
//! | `none`                | heuristics only              | none                     |

mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;

pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;

use async_trait::async_trait;
use reqwest::Response;

use crate::error::{Error, Result};
use crate::models::GeneratedInsight;

/// Instruction shared by every remote backend
pub(crate) const ADVISOR_SYSTEM_PROMPT: &str = "You review personal subscription spending. \
Answer only with a JSON object of the form {\"insights\": [...]}, no prose.";

/// Turn a non-2xx reply into an [`Error::Ai`] carrying the body text
pub(crate) async fn ensure_success(response: Response, backend: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Ai(format!("{} returned {}: {}", backend, status, body.trim())))
}

#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Raw completion text for `prompt`
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Completion parsed into sanitized insights
    async fn generate_insights(&self, prompt: &str) -> Result<Vec<GeneratedInsight>> {
        let text = self.generate(prompt).await?;
        parsing::parse_insight_response(&text)
    }

    async fn health_check(&self) -> bool;

    fn model(&self) -> &str;

    fn host(&self) -> &str;
}

/// Backend selected at startup
#[derive(Clone)]
pub enum AIClient {
    Ollama(OllamaBackend),
    OpenAICompatible(OpenAICompatibleBackend),
    Mock(MockBackend),
}

impl AIClient {
    /// Read `AI_BACKEND` and the backend's own variables
    ///
    /// `None` means insights come from the heuristic generator alone.
    pub fn from_env() -> Option<Self> {
        let choice = std::env::var("AI_BACKEND")
            .map(|v| v.trim().to_lowercase())
            .unwrap_or_default();

        match choice.as_str() {
            "" | "ollama" => OllamaBackend::from_env().map(Self::Ollama),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(Self::OpenAICompatible)
            }
            "mock" => Some(Self::mock()),
            "none" | "off" | "disabled" => None,
            unknown => {
                tracing::warn!(backend = %unknown, "Unrecognized AI_BACKEND, trying Ollama");
                OllamaBackend::from_env().map(Self::Ollama)
            }
        }
    }

    pub fn ollama(host: &str, model: &str) -> Self {
        Self::Ollama(OllamaBackend::new(host, model))
    }

    pub fn mock() -> Self {
        Self::Mock(MockBackend::new())
    }

    /// Short label for logs and `/api/health`
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Ollama(_) => "ollama",
            Self::OpenAICompatible(_) => "openai_compatible",
            Self::Mock(_) => "mock",
        }
    }

    fn inner(&self) -> &dyn AIBackend {
        match self {
            Self::Ollama(b) => b,
            Self::OpenAICompatible(b) => b,
            Self::Mock(b) => b,
        }
    }
}

#[async_trait]
impl AIBackend for AIClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.inner().generate(prompt).await
    }

    async fn health_check(&self) -> bool {
        self.inner().health_check().await
    }

    fn model(&self) -> &str {
        self.inner().model()
    }

    fn host(&self) -> &str {
        self.inner().host()
    }
}
