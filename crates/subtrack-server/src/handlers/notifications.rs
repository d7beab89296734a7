//! Notification handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::{AppError, AppState, SuccessResponse};
use subtrack_core::models::Notification;

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

/// GET /api/notifications - Newest first, optionally unread only
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(state.db.list_notifications(user.id, query.unread_only)?))
}

/// GET /api/notifications/unread-count
pub async fn unread_notification_count(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let count = state.db.count_unread_notifications(user.id)?;
    Ok(Json(UnreadCountResponse { count }))
}

/// POST /api/notifications/:id/read
pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.mark_notification_read(user.id, id)?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/notifications/read-all
pub async fn mark_all_notifications_read(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    let updated = state.db.mark_all_notifications_read(user.id)?;
    Ok(Json(MarkAllReadResponse { updated }))
}

/// DELETE /api/notifications/:id
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.delete_notification(user.id, id)?;
    Ok(Json(SuccessResponse { success: true }))
}
