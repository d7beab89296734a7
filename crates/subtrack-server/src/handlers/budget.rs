//! Monthly budget and budget report handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::today;
use crate::auth::AuthUser;
use crate::{AppError, AppState};
use subtrack_core::analytics::{self, resolve_currency};
use subtrack_core::db::validate_month;
use subtrack_core::models::{BudgetReport, BudgetStatus};

#[derive(Debug, Deserialize)]
pub struct BudgetQuery {
    pub currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateReportRequest {
    /// `YYYY-MM`; defaults to the current month
    pub month: Option<String>,
    pub currency: Option<String>,
}

/// GET /api/budget - Current month's spend against the budget
pub async fn get_budget(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<BudgetQuery>,
) -> Result<Json<BudgetStatus>, AppError> {
    let currency = resolve_currency(query.currency.as_deref(), Some(&user));
    let status = analytics::budget_status(&state.db, &user, &currency, today())?;
    Ok(Json(status))
}

/// PUT /api/budget - Set the monthly budget; `null` clears it
pub async fn set_budget(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(body): Json<Value>,
) -> Result<Json<BudgetStatus>, AppError> {
    let budget = match body.get("monthly_budget") {
        None => return Err(AppError::missing_fields(&["monthly_budget"])),
        Some(Value::Null) => None,
        Some(value) => Some(value.as_f64().ok_or_else(|| {
            AppError::bad_request("monthly_budget must be a number or null")
        })?),
    };

    state.db.set_monthly_budget(user.id, budget)?;
    info!(user_id = user.id, budget = ?budget, "Monthly budget updated");

    let user = state
        .db
        .get_user(user.id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let currency = resolve_currency(None, Some(&user));
    let status = analytics::budget_status(&state.db, &user, &currency, today())?;
    Ok(Json(status))
}

/// GET /api/budget/reports - Stored reports, newest month first
pub async fn list_budget_reports(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<Vec<BudgetReport>>, AppError> {
    Ok(Json(state.db.list_budget_reports(user.id)?))
}

/// POST /api/budget/reports - Compute and store the report for a month
///
/// Regenerating a month replaces its report. A month whose spend exceeds
/// the budget also produces a notification.
pub async fn generate_budget_report(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    body: Option<Json<GenerateReportRequest>>,
) -> Result<(StatusCode, Json<BudgetReport>), AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let month = req
        .month
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| today().format("%Y-%m").to_string());
    validate_month(&month)?;

    let currency = resolve_currency(req.currency.as_deref(), Some(&user));
    let computed = analytics::compute_budget_report(&state.db, &user, &month, &currency)?;
    let report = state.db.upsert_budget_report(user.id, &computed)?;

    if let Some(budget) = report.budget.filter(|b| report.total_spent > *b) {
        state.db.create_notification(
            user.id,
            "budget_exceeded",
            "Monthly budget exceeded",
            &format!(
                "You spent {:.2} {} in {}, over your budget of {:.2}.",
                report.total_spent, report.currency, report.month, budget
            ),
            Some(report.id),
        )?;
    }

    info!(
        user_id = user.id,
        month = %report.month,
        spent = report.total_spent,
        expected = report.expected_spend,
        "Budget report generated"
    );
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/budget/reports/:month
pub async fn get_budget_report(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(month): Path<String>,
) -> Result<Json<BudgetReport>, AppError> {
    validate_month(&month)?;
    let report = state
        .db
        .get_budget_report(user.id, &month)?
        .ok_or_else(|| AppError::not_found(&format!("No budget report for {}", month)))?;
    Ok(Json(report))
}
