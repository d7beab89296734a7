//! SubTrack Core Library
//!
//! Shared functionality for the SubTrack subscription tracker:
//! - Domain models and billing-cycle arithmetic
//! - Database access and migrations (SQLite, pooled)
//! - Spending analytics (summaries, trends, categories, budget)
//! - Insight generator with pluggable AI backends and heuristic fallback
//! - Password hashing

pub mod ai;
pub mod analytics;
pub mod billing;
pub mod db;
pub mod error;
pub mod insights;
pub mod models;
pub mod password;

/// Test utilities including a mock AI server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, MockBackend, OllamaBackend, OpenAICompatibleBackend};
pub use db::Database;
pub use error::{Error, Result};
pub use insights::{AnalysisContext, InsightEngine};
