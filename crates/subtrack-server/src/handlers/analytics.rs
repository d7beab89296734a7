//! Spending analytics handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;

use super::today;
use crate::auth::AuthUser;
use crate::{AppError, AppState};
use subtrack_core::analytics;
use subtrack_core::models::{
    AnalyticsMode, AnalyticsPeriod, CategorySpending, SpendingSummary, TrendsReport,
};

/// Query params shared by the analytics endpoints
///
/// Unknown `period`/`mode` values fall back to monthly/actual; `currency`
/// defaults to the user's preferred currency.
#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub period: Option<String>,
    pub mode: Option<String>,
    pub currency: Option<String>,
}

impl AnalyticsQuery {
    fn resolve(&self, user: &subtrack_core::models::User) -> (AnalyticsPeriod, AnalyticsMode, String) {
        (
            AnalyticsPeriod::parse_or_default(self.period.as_deref()),
            AnalyticsMode::parse_or_default(self.mode.as_deref()),
            analytics::resolve_currency(self.currency.as_deref(), Some(user)),
        )
    }
}

/// GET /api/analytics/summary - Total spend for the current period
pub async fn analytics_summary(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<SpendingSummary>, AppError> {
    let (period, mode, currency) = query.resolve(&user);
    let summary = analytics::spending_summary(&state.db, user.id, period, mode, &currency, today())?;
    Ok(Json(summary))
}

/// GET /api/analytics/trends - Spend per bucket, oldest first
pub async fn analytics_trends(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<TrendsReport>, AppError> {
    let (period, mode, currency) = query.resolve(&user);
    let report = analytics::trends(&state.db, user.id, period, mode, &currency, today())?;
    Ok(Json(report))
}

/// GET /api/analytics/categories - Spend per category, largest first
pub async fn analytics_categories(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<CategorySpending>>, AppError> {
    let (period, mode, currency) = query.resolve(&user);
    let categories =
        analytics::category_breakdown(&state.db, user.id, period, mode, &currency, today())?;
    Ok(Json(categories))
}
