//! Health check handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use subtrack_core::ai::AIBackend;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub ai: AiHealth,
}

#[derive(Serialize)]
pub struct AiHealth {
    pub configured: bool,
    pub backend: Option<&'static str>,
    pub model: Option<String>,
    pub available: bool,
}

/// GET /api/health - Liveness plus database and AI backend status
///
/// Always 200; a missing AI backend is normal (heuristics cover it).
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = state
        .db
        .conn()
        .and_then(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
        .is_ok();

    let ai = match &state.ai {
        Some(client) => AiHealth {
            configured: true,
            backend: Some(client.backend_name()),
            model: Some(client.model().to_string()),
            available: client.health_check().await,
        },
        None => AiHealth {
            configured: false,
            backend: None,
            model: None,
            available: false,
        },
    };

    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
        ai,
    })
}
