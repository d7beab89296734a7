//! Mock backend for testing
//!
//! Returns a canned response (or a failure) without any network I/O.

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::AIBackend;

/// Default canned reply: a valid insight list with three entries
const DEFAULT_RESPONSE: &str = r#"[
  {"type": "saving", "message": "Review overlapping subscriptions to cut monthly costs.", "affected_services": [], "confidence_score": 0.8},
  {"type": "reminder", "message": "Check upcoming renewals before they charge.", "affected_services": [], "confidence_score": 0.75},
  {"type": "suggestion", "message": "Set a monthly budget to track subscription spend.", "affected_services": [], "confidence_score": 0.7}
]"#;

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    /// Text returned from `generate`; `None` makes every call fail
    pub response: Option<String>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy, default response)
    pub fn new() -> Self {
        Self {
            healthy: true,
            response: Some(DEFAULT_RESPONSE.to_string()),
        }
    }

    /// Create a mock that replies with `response`
    pub fn with_response(response: &str) -> Self {
        Self {
            healthy: true,
            response: Some(response.to_string()),
        }
    }

    /// Create a mock whose calls always fail
    pub fn failing() -> Self {
        Self {
            healthy: false,
            response: None,
        }
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.response
            .clone()
            .ok_or_else(|| Error::Ai("Mock AI backend configured to fail".into()))
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
