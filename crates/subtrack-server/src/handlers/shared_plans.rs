//! Shared plan handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;

use super::{parse_optional, RequiredFields};
use crate::auth::AuthUser;
use crate::{AppError, AppState, SuccessResponse};
use subtrack_core::models::{
    BillingCycle, NewParticipant, NewSharedPlan, Participant, SharedPlanWithParticipants,
    SplitType, Subscription,
};

#[derive(Debug, Deserialize)]
pub struct CreateSharedPlanRequest {
    pub subscription_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub total_amount: Option<f64>,
    pub currency: Option<String>,
    pub billing_cycle: Option<String>,
    pub split_type: Option<String>,
    #[serde(default)]
    pub participants: Vec<NewParticipant>,
}

#[derive(Debug, Deserialize)]
pub struct AddParticipantRequest {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub accept: Option<bool>,
}

/// GET /api/shared-plans - Plans the user owns or participates in
pub async fn list_shared_plans(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<Vec<SharedPlanWithParticipants>>, AppError> {
    Ok(Json(state.db.list_shared_plans(user.id)?))
}

/// POST /api/shared-plans - Create a plan and invite participants
///
/// When linked to a subscription, `name`, `total_amount`, `currency` and
/// `billing_cycle` default to the subscription's values.
pub async fn create_shared_plan(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(req): Json<CreateSharedPlanRequest>,
) -> Result<(StatusCode, Json<SharedPlanWithParticipants>), AppError> {
    let linked: Option<Subscription> = match req.subscription_id {
        Some(id) => Some(
            state
                .db
                .get_subscription(user.id, id)?
                .ok_or_else(|| AppError::not_found(&format!("Subscription {} not found", id)))?,
        ),
        None => None,
    };

    let mut required = RequiredFields::default();
    let name = required.text(
        "name",
        req.name.as_deref().or(linked.as_ref().map(|s| s.name.as_str())),
    );
    let total_amount = required.value(
        "total_amount",
        req.total_amount.or(linked.as_ref().map(|s| s.amount)),
    );
    required.finish()?;

    let billing_cycle = match (req.billing_cycle.as_deref(), &linked) {
        (None, Some(sub)) => sub.billing_cycle,
        (cycle, _) => BillingCycle::parse_or_default(cycle),
    };
    let currency = req
        .currency
        .filter(|c| !c.trim().is_empty())
        .or_else(|| linked.as_ref().map(|s| s.currency.clone()))
        .unwrap_or_else(|| user.currency.clone());

    let plan = state.db.create_shared_plan(
        &user,
        &NewSharedPlan {
            subscription_id: req.subscription_id,
            name: name.unwrap_or_default(),
            description: req.description,
            total_amount: total_amount.unwrap_or_default(),
            currency,
            billing_cycle,
            split_type: parse_optional::<SplitType>("split_type", req.split_type.as_deref())?
                .unwrap_or_default(),
            participants: req.participants,
        },
    )?;

    info!(
        user_id = user.id,
        plan_id = plan.plan.id,
        participants = plan.participants.len(),
        "Shared plan created"
    );
    Ok((StatusCode::CREATED, Json(plan)))
}

/// GET /api/shared-plans/:id
pub async fn get_shared_plan(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SharedPlanWithParticipants>, AppError> {
    let plan = state
        .db
        .get_shared_plan(user.id, id)?
        .ok_or_else(|| AppError::not_found(&format!("Shared plan {} not found", id)))?;
    Ok(Json(plan))
}

/// DELETE /api/shared-plans/:id - Owner only
pub async fn delete_shared_plan(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.delete_shared_plan(user.id, id)?;
    info!(user_id = user.id, plan_id = id, "Shared plan deleted");
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/shared-plans/:id/participants - Invite someone (owner only)
pub async fn add_participant(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<AddParticipantRequest>,
) -> Result<(StatusCode, Json<Participant>), AppError> {
    let mut required = RequiredFields::default();
    let email = required.text("email", req.email.as_deref());
    required.finish()?;

    let participant = state.db.add_participant(
        user.id,
        id,
        &NewParticipant {
            email: email.unwrap_or_default(),
            name: req.name.filter(|n| !n.trim().is_empty()),
        },
    )?;
    info!(user_id = user.id, plan_id = id, participant_id = participant.id, "Participant invited");
    Ok((StatusCode::CREATED, Json(participant)))
}

/// DELETE /api/shared-plans/:id/participants/:participant_id - Owner only
pub async fn remove_participant(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((id, participant_id)): Path<(i64, i64)>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.remove_participant(user.id, id, participant_id)?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/shared-plans/:id/respond - Accept or decline an invitation
pub async fn respond_to_invitation(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<Participant>, AppError> {
    let mut required = RequiredFields::default();
    let accept = required.value("accept", req.accept);
    required.finish()?;

    let participant = state
        .db
        .respond_to_invitation(&user, id, accept.unwrap_or_default())?;
    info!(user_id = user.id, plan_id = id, status = %participant.status, "Invitation answered");
    Ok(Json(participant))
}
