use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use garde::Validate;
use serde::Deserialize;

use crate::{
    error::Result,
    models::session::AuthContext,
    models::user::{ProfileUpdate, UserId},
    state::AppState,
    validation::auth::{validate_optional_username, validated},
};

/// The request payload for editing a profile. Absent fields stay as they are.
#[derive(Deserialize, Validate, Debug, Default)]
pub struct UpdateProfileRequest {
    #[garde(length(min = 3, max = 32), custom(validate_optional_username))]
    pub username: Option<String>,
    #[garde(email, length(max = 255))]
    pub email: Option<String>,
    #[garde(length(max = 500))]
    pub bio: Option<String>,
    #[garde(length(max = 500))]
    pub avatar_url: Option<String>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(req: UpdateProfileRequest) -> Self {
        Self {
            username: req.username,
            email: req.email,
            bio: req.bio,
            avatar_url: req.avatar_url,
        }
    }
}

/// Returns a user's public profile.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Response> {
    let profile = state.profiles.public_profile(user_id).await?;
    Ok((StatusCode::OK, Json(profile)).into_response())
}

/// Returns the caller's own profile.
pub async fn me(State(state): State<AppState>, ctx: AuthContext) -> Result<Response> {
    let profile = state.profiles.own_profile(&ctx).await?;
    Ok((StatusCode::OK, Json(profile)).into_response())
}

/// Edits a profile. Only allowed on the caller's own.
pub async fn update_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(user_id): Path<UserId>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Response> {
    let payload = validated(payload)?;
    let profile = state
        .profiles
        .update_profile(&ctx, user_id, payload.into())
        .await?;
    Ok((StatusCode::OK, Json(profile)).into_response())
}
