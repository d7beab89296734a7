//! Subscription management handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;

use super::{parse_optional, today, RequiredFields};
use crate::auth::AuthUser;
use crate::{AppError, AppState, SuccessResponse};
use subtrack_core::billing::next_billing_date;
use subtrack_core::models::{
    BillingCycle, NewPayment, NewSubscription, Payment, PaymentFilter, PaymentRecorded,
    PaymentStatus, Subscription, SubscriptionFilter, SubscriptionStatus, SubscriptionUpdate,
    UpcomingRenewal,
};

/// Default look-ahead for upcoming renewals
const DEFAULT_UPCOMING_DAYS: i64 = 7;

/// Longest look-ahead for upcoming renewals
const MAX_UPCOMING_DAYS: i64 = 365;

/// Query params for listing subscriptions
#[derive(Debug, Deserialize)]
pub struct ListSubscriptionsQuery {
    pub status: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    /// Unknown cycles are treated as monthly
    pub billing_cycle: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub next_billing_date: Option<NaiveDate>,
    pub auto_renew: Option<bool>,
    pub payment_method: Option<String>,
    pub website_url: Option<String>,
    pub notes: Option<String>,
    pub reminder_days: Option<i64>,
}

/// Body for marking a subscription paid; every field is optional
#[derive(Debug, Default, Deserialize)]
pub struct PayRequest {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub status: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl PayRequest {
    pub(crate) fn into_new_payment(self) -> Result<NewPayment, AppError> {
        let status = parse_optional::<PaymentStatus>("status", self.status.as_deref())?;
        Ok(NewPayment {
            amount: self.amount,
            currency: self.currency.filter(|c| !c.trim().is_empty()),
            payment_method: self.payment_method,
            status: status.unwrap_or_default(),
            paid_at: self.paid_at,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub days: Option<i64>,
}

/// GET /api/subscriptions - List the user's subscriptions
pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<ListSubscriptionsQuery>,
) -> Result<Json<Vec<Subscription>>, AppError> {
    let filter = SubscriptionFilter {
        status: parse_optional::<SubscriptionStatus>("status", query.status.as_deref())?,
        category: query.category.filter(|c| !c.trim().is_empty()),
    };
    Ok(Json(state.db.list_subscriptions(user.id, &filter)?))
}

/// POST /api/subscriptions - Create a subscription
///
/// `name` and `amount` are required. Currency defaults to the user's
/// preference, the start date to today, and the next billing date to one
/// cycle after the start date.
pub async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(req): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<Subscription>), AppError> {
    let mut required = RequiredFields::default();
    let name = required.text("name", req.name.as_deref());
    let amount = required.value("amount", req.amount);
    required.finish()?;

    let billing_cycle = BillingCycle::parse_or_default(req.billing_cycle.as_deref());
    let start_date = req.start_date.unwrap_or_else(today);
    let next = match req.next_billing_date {
        Some(date) => date,
        None => next_billing_date(billing_cycle, start_date)?,
    };

    let subscription = state.db.create_subscription(
        user.id,
        &NewSubscription {
            name: name.unwrap_or_default(),
            description: req.description,
            category: req.category.filter(|c| !c.trim().is_empty()),
            amount: amount.unwrap_or_default(),
            currency: req
                .currency
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| user.currency.clone()),
            billing_cycle,
            start_date,
            next_billing_date: next,
            auto_renew: req.auto_renew.unwrap_or(true),
            payment_method: req.payment_method,
            website_url: req.website_url,
            notes: req.notes,
            reminder_days: req.reminder_days.unwrap_or(3).max(0),
        },
    )?;

    info!(user_id = user.id, subscription_id = subscription.id, "Subscription created");
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// GET /api/subscriptions/:id
pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Subscription>, AppError> {
    let subscription = state
        .db
        .get_subscription(user.id, id)?
        .ok_or_else(|| AppError::not_found(&format!("Subscription {} not found", id)))?;
    Ok(Json(subscription))
}

/// PUT /api/subscriptions/:id - Partial update
pub async fn update_subscription(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(update): Json<SubscriptionUpdate>,
) -> Result<Json<Subscription>, AppError> {
    if update.amount.is_some_and(|a| a < 0.0) {
        return Err(AppError::bad_request("Amount must be a non-negative number"));
    }
    Ok(Json(state.db.update_subscription(user.id, id, &update)?))
}

/// DELETE /api/subscriptions/:id - Delete a subscription and its payments
pub async fn delete_subscription(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.delete_subscription(user.id, id)?;
    info!(user_id = user.id, subscription_id = id, "Subscription deleted");
    Ok(Json(SuccessResponse { success: true }))
}

fn change_status(
    state: &AppState,
    user_id: i64,
    id: i64,
    status: SubscriptionStatus,
) -> Result<Json<Subscription>, AppError> {
    let subscription = state.db.set_subscription_status(user_id, id, status)?;
    info!(user_id, subscription_id = id, status = %status, "Subscription status changed");
    Ok(Json(subscription))
}

/// POST /api/subscriptions/:id/cancel - Cancel (final)
pub async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Subscription>, AppError> {
    change_status(&state, user.id, id, SubscriptionStatus::Cancelled)
}

/// POST /api/subscriptions/:id/pause
pub async fn pause_subscription(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Subscription>, AppError> {
    change_status(&state, user.id, id, SubscriptionStatus::Paused)
}

/// POST /api/subscriptions/:id/resume
pub async fn resume_subscription(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Subscription>, AppError> {
    change_status(&state, user.id, id, SubscriptionStatus::Active)
}

/// POST /api/subscriptions/:id/pay - Record a payment and advance the billing date
///
/// The body is optional; amount and currency default to the subscription's.
pub async fn pay_subscription(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
    body: Option<Json<PayRequest>>,
) -> Result<(StatusCode, Json<PaymentRecorded>), AppError> {
    let payment = body.map(|Json(b)| b).unwrap_or_default().into_new_payment()?;
    let recorded = super::payments::record(&state, user.id, id, &payment)?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

/// GET /api/subscriptions/:id/payments - Payment history for one subscription
pub async fn list_subscription_payments(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Payment>>, AppError> {
    state
        .db
        .get_subscription(user.id, id)?
        .ok_or_else(|| AppError::not_found(&format!("Subscription {} not found", id)))?;

    let payments = state.db.list_payments(
        user.id,
        &PaymentFilter {
            subscription_id: Some(id),
            limit: crate::MAX_PAGE_LIMIT,
            ..Default::default()
        },
    )?;
    Ok(Json(payments))
}

/// GET /api/subscriptions/upcoming - Active subscriptions due soon
pub async fn upcoming_renewals(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<Vec<UpcomingRenewal>>, AppError> {
    let days = query
        .days
        .unwrap_or(DEFAULT_UPCOMING_DAYS)
        .clamp(0, MAX_UPCOMING_DAYS);
    let renewals = subtrack_core::analytics::upcoming_renewals(&state.db, user.id, today(), days)?;
    Ok(Json(renewals))
}
