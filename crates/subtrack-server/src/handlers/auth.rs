//! Registration, login and current-user handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::RequiredFields;
use crate::auth::{issue_token, AuthUser};
use crate::{AppError, AppState};
use subtrack_core::models::{NewUser, User};
use subtrack_core::password::{hash_password, verify_password};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub country: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Token plus the user it was issued for
#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// POST /api/auth/register - Create an account and return a token
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let mut required = RequiredFields::default();
    let email = required.text("email", req.email.as_deref());
    let password = required.value("password", req.password.filter(|p| !p.is_empty()));
    let name = required.text("name", req.name.as_deref());
    required.finish()?;

    let email = email.unwrap_or_default();
    if !email.contains('@') {
        return Err(AppError::bad_request("Invalid email address"));
    }

    let password_hash = hash_password(&password.unwrap_or_default())?;
    let user = state.db.create_user(&NewUser {
        email,
        password_hash,
        name: name.unwrap_or_default(),
        country: req.country.filter(|c| !c.trim().is_empty()),
        currency: req.currency.filter(|c| !c.trim().is_empty()),
    })?;

    let token = issue_token(user.id, &state.config.jwt_secret, state.config.token_ttl_hours)?;
    info!(user_id = user.id, "User registered");

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// POST /api/auth/login - Exchange credentials for a token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let mut required = RequiredFields::default();
    let email = required.text("email", req.email.as_deref());
    let password = required.value("password", req.password);
    required.finish()?;

    let email = email.unwrap_or_default();
    let password = password.unwrap_or_default();

    let credentials = state.db.get_user_credentials(&email)?;
    let user = match credentials {
        Some((user, hash)) if verify_password(&password, &hash) => user,
        _ => {
            warn!(email = %email, "Failed login");
            return Err(AppError::unauthorized("Invalid email or password"));
        }
    };

    let token = issue_token(user.id, &state.config.jwt_secret, state.config.token_ttl_hours)?;
    info!(user_id = user.id, "User logged in");

    Ok(Json(AuthResponse { token, user }))
}

/// GET /api/auth/me - The authenticated user
pub async fn get_me(Extension(AuthUser(user)): Extension<AuthUser>) -> Json<User> {
    Json(user)
}
