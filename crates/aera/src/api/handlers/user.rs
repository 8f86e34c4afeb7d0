//! User profile handlers.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::auth::CurrentUser;
use crate::user::{UpdateUserRequest, UserInfo};

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

#[derive(Debug, Serialize)]
pub struct UserInfoResponse {
    pub success: bool,
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct UpdateUserResponse {
    pub success: bool,
    pub name: String,
    #[serde(rename = "prePrompt")]
    pub pre_prompt: String,
}

/// Get the caller's profile.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn get_user_info(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<UserInfoResponse>> {
    let user = state
        .users
        .get_user(user.id())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserInfoResponse {
        success: true,
        user: user.into(),
    }))
}

/// Update the caller's name and/or pre-prompt.
#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<UpdateUserResponse>> {
    let updated = state.users.update_profile(user.id(), request).await?;

    Ok(Json(UpdateUserResponse {
        success: true,
        name: updated.name,
        pre_prompt: updated.pre_prompt,
    }))
}
