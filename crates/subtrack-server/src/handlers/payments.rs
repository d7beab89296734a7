//! Payment handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::subscriptions::PayRequest;
use super::{parse_optional, RequiredFields};
use crate::auth::AuthUser;
use crate::{AppError, AppState, MAX_PAGE_LIMIT};
use subtrack_core::models::{NewPayment, Payment, PaymentFilter, PaymentRecorded, PaymentStatus};

/// Default page size for payment listings
const DEFAULT_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub subscription_id: Option<i64>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub subscription_id: Option<i64>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub status: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentStatusRequest {
    pub status: Option<String>,
}

/// Record a payment, notifying the user when it did not go through
pub(crate) fn record(
    state: &AppState,
    user_id: i64,
    subscription_id: i64,
    payment: &NewPayment,
) -> Result<PaymentRecorded, AppError> {
    let recorded = state.db.record_payment(user_id, subscription_id, payment)?;

    if recorded.payment.status == PaymentStatus::Failed {
        state.db.create_notification(
            user_id,
            "payment_failed",
            "Payment failed",
            &format!(
                "The payment of {:.2} {} for {} failed.",
                recorded.payment.amount, recorded.payment.currency, recorded.subscription.name
            ),
            Some(subscription_id),
        )?;
    }

    info!(
        user_id,
        subscription_id,
        payment_id = recorded.payment.id,
        status = %recorded.payment.status,
        "Payment recorded"
    );
    Ok(recorded)
}

/// GET /api/payments - List payments, newest first
pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let filter = PaymentFilter {
        subscription_id: query.subscription_id,
        status: parse_optional::<PaymentStatus>("status", query.status.as_deref())?,
        limit: query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        offset: query.offset.unwrap_or(0).max(0),
    };
    Ok(Json(state.db.list_payments(user.id, &filter)?))
}

/// POST /api/payments - Record a payment against a subscription
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentRecorded>), AppError> {
    let mut required = RequiredFields::default();
    let subscription_id = required.value("subscription_id", req.subscription_id);
    required.finish()?;

    let payment = PayRequest {
        amount: req.amount,
        currency: req.currency,
        payment_method: req.payment_method,
        status: req.status,
        paid_at: req.paid_at,
        notes: req.notes,
    }
    .into_new_payment()?;

    let recorded = record(&state, user.id, subscription_id.unwrap_or_default(), &payment)?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

/// GET /api/payments/:id
pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Payment>, AppError> {
    let payment = state
        .db
        .get_payment(user.id, id)?
        .ok_or_else(|| AppError::not_found(&format!("Payment {} not found", id)))?;
    Ok(Json(payment))
}

/// PATCH /api/payments/:id/status - The only change allowed on a recorded payment
pub async fn update_payment_status(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePaymentStatusRequest>,
) -> Result<Json<Payment>, AppError> {
    let status = parse_optional::<PaymentStatus>("status", req.status.as_deref())?
        .ok_or_else(|| AppError::missing_fields(&["status"]))?;
    let payment = state.db.update_payment_status(user.id, id, status)?;
    info!(user_id = user.id, payment_id = id, status = %status, "Payment status updated");
    Ok(Json(payment))
}
