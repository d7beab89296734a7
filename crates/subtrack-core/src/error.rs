//! Error types for SubTrack

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The language model backend failed or replied with something unusable
    #[error("AI backend error: {0}")]
    Ai(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Request is missing required fields or carries invalid values
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl Error {
    /// Build a validation error listing the missing field names
    pub fn missing_fields(fields: &[&str]) -> Self {
        Error::Validation(format!("Missing required fields: {}", fields.join(", ")))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
