//! Profile, password, avatar and account handlers

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Extension, Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::RequiredFields;
use crate::auth::AuthUser;
use crate::{AppError, AppState, SuccessResponse, MAX_AVATAR_SIZE};
use subtrack_core::models::{ProfileUpdate, User};
use subtrack_core::password::{hash_password, verify_password};

/// URL prefix under which avatar files are served
const AVATAR_URL_PREFIX: &str = "/uploads/avatars/";

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// GET /api/user/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<User>, AppError> {
    let user = state
        .db
        .get_user(user.id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(user))
}

/// PUT /api/user/profile - Partial update of name, country, currency and budget
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, AppError> {
    if update.monthly_budget.is_some_and(|b| b < 0.0) {
        return Err(AppError::bad_request(
            "Monthly budget must be a non-negative number",
        ));
    }
    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::bad_request("Name cannot be empty"));
    }

    let update = ProfileUpdate {
        name: update.name.map(|n| n.trim().to_string()),
        currency: update.currency.filter(|c| !c.trim().is_empty()),
        ..update
    };
    let user = state.db.update_user_profile(user.id, &update)?;
    info!(user_id = user.id, "Profile updated");
    Ok(Json(user))
}

/// PUT /api/user/password - Change password after re-checking the current one
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let mut required = RequiredFields::default();
    let current = required.value("current_password", req.current_password.filter(|p| !p.is_empty()));
    let new = required.value("new_password", req.new_password.filter(|p| !p.is_empty()));
    required.finish()?;

    let stored = state.db.get_password_hash(user.id)?;
    if !verify_password(&current.unwrap_or_default(), &stored) {
        warn!(user_id = user.id, "Password change with wrong current password");
        return Err(AppError::bad_request("Current password is incorrect"));
    }

    let hash = hash_password(&new.unwrap_or_default())?;
    state.db.update_user_password(user.id, &hash)?;
    info!(user_id = user.id, "Password changed");
    Ok(Json(SuccessResponse { success: true }))
}

/// File extension for an accepted image content type
fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/bmp" => Some("bmp"),
        _ => None,
    }
}

/// Remove a previously stored avatar if its URL points into the avatars dir
async fn remove_avatar_file(avatars_dir: &FsPath, avatar_url: Option<&str>) {
    let Some(file_name) = avatar_url.and_then(|url| url.strip_prefix(AVATAR_URL_PREFIX)) else {
        return;
    };
    // Plain file names only
    if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.contains("..") {
        return;
    }

    let path = avatars_dir.join(file_name);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove old avatar");
        }
    }
}

/// POST /api/user/avatar - Upload a profile image
///
/// Expects a multipart form with an `avatar` (or `file`) field holding an
/// image up to 5 MB. The previous avatar file is removed.
pub async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<Json<User>, AppError> {
    let mut upload: Option<(&'static str, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name != "avatar" && name != "file" {
            continue;
        }

        let content_type = field.content_type().unwrap_or("").to_lowercase();
        let ext = image_extension(&content_type).ok_or_else(|| {
            AppError::bad_request("Only image files (jpeg, png, gif, webp, bmp) are allowed")
        })?;

        let bytes = field
            .bytes()
            .await
            .map_err(|_| AppError::bad_request("Failed to read file data"))?;
        if bytes.len() > MAX_AVATAR_SIZE {
            return Err(AppError::bad_request(&format!(
                "File too large. Maximum size is {} MB",
                MAX_AVATAR_SIZE / 1024 / 1024
            )));
        }
        if bytes.is_empty() {
            return Err(AppError::bad_request("Uploaded file is empty"));
        }

        upload = Some((ext, bytes.to_vec()));
        break;
    }

    let (ext, data) = upload.ok_or_else(|| AppError::missing_fields(&["avatar"]))?;

    let avatars_dir = state.config.avatars_dir();
    tokio::fs::create_dir_all(&avatars_dir)
        .await
        .map_err(|e| AppError::internal(&format!("Failed to prepare upload directory: {}", e)))?;

    let file_name = format!(
        "user_{}_{}.{}",
        user.id,
        chrono::Utc::now().timestamp_millis(),
        ext
    );
    tokio::fs::write(avatars_dir.join(&file_name), &data)
        .await
        .map_err(|e| AppError::internal(&format!("Failed to store avatar: {}", e)))?;

    state
        .db
        .set_user_avatar(user.id, &format!("{}{}", AVATAR_URL_PREFIX, file_name))?;
    remove_avatar_file(&avatars_dir, user.avatar_url.as_deref()).await;

    info!(user_id = user.id, file = %file_name, size = data.len(), "Avatar uploaded");

    let user = state
        .db
        .get_user(user.id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(user))
}

/// DELETE /api/user - Delete the account and everything it owns
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.delete_user(user.id)?;
    remove_avatar_file(&state.config.avatars_dir(), user.avatar_url.as_deref()).await;
    info!(user_id = user.id, "Account deleted");
    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("image/png"), Some("png"));
        assert_eq!(image_extension("image/jpeg"), Some("jpg"));
        assert_eq!(image_extension("application/pdf"), None);
        // Scriptable formats are refused
        assert_eq!(image_extension("image/svg+xml"), None);
        assert_eq!(image_extension(""), None);
    }

    #[tokio::test]
    async fn test_remove_avatar_file_stays_inside_dir() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("keep.png");
        tokio::fs::write(&outside, b"x").await.unwrap();
        let avatars = dir.path().join("avatars");
        tokio::fs::create_dir_all(&avatars).await.unwrap();
        let inside = avatars.join("user_1_1.png");
        tokio::fs::write(&inside, b"x").await.unwrap();

        remove_avatar_file(&avatars, Some("/uploads/avatars/../keep.png")).await;
        remove_avatar_file(&avatars, Some("https://example.com/a.png")).await;
        assert!(outside.exists());

        remove_avatar_file(&avatars, Some("/uploads/avatars/user_1_1.png")).await;
        assert!(!inside.exists());
    }
}
