//! AI insight handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use super::today;
use crate::auth::AuthUser;
use crate::{AppError, AppState, SuccessResponse};
use subtrack_core::models::AiInsight;
use subtrack_core::{AnalysisContext, InsightEngine};

#[derive(Debug, Deserialize)]
pub struct ListInsightsQuery {
    #[serde(default)]
    pub include_resolved: bool,
}

/// GET /api/ai-insights - Stored insights, unresolved first
pub async fn list_insights(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<ListInsightsQuery>,
) -> Result<Json<Vec<AiInsight>>, AppError> {
    Ok(Json(state.db.list_insights(user.id, query.include_resolved)?))
}

/// POST /api/ai-insights/generate - Analyze the user's subscriptions
///
/// Uses the configured AI backend when there is one and falls back to the
/// heuristic generator. Returns every unresolved insight afterwards.
pub async fn generate_insights(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<Vec<AiInsight>>, AppError> {
    let ctx = AnalysisContext::new(&state.db, state.ai.as_ref(), &user, today());
    let insights = InsightEngine::new().generate(&ctx).await?;
    Ok(Json(insights))
}

/// POST /api/ai-insights/:id/resolve
pub async fn resolve_insight(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.resolve_insight(user.id, id)?;
    Ok(Json(SuccessResponse { success: true }))
}

/// DELETE /api/ai-insights/:id
pub async fn delete_insight(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.delete_insight(user.id, id)?;
    Ok(Json(SuccessResponse { success: true }))
}
