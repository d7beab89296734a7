//! Insight generator
//!
//! Turns a user's subscriptions and payments into short, actionable
//! insights. An AI backend is asked first; when it is missing, fails, or
//! returns fewer than three usable items, rule-based heuristics fill in.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use subtrack_core::insights::{AnalysisContext, InsightEngine};
//!
//! let engine = InsightEngine::new();
//! let ctx = AnalysisContext::today(&db, ai.as_ref(), &user);
//! let insights = engine.generate(&ctx).await?;
//! ```

pub mod engine;
pub mod features;
pub mod heuristics;
pub mod prompt;

pub use engine::{merge_insights, AnalysisContext, InsightEngine};
pub use features::FeatureSummary;
pub use heuristics::generate_heuristic_insights;
pub use prompt::build_insight_prompt;
