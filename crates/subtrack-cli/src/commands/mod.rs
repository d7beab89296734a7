//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - `init` and the shared `open_db` helper
//! - `insights` - Insight generation for one user
//! - `serve` - Web server command
//! - `users` - Account listing

pub mod core;
pub mod insights;
pub mod serve;
pub mod users;

// Re-export command functions for main.rs
pub use core::*;
pub use insights::*;
pub use serve::*;
pub use users::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
