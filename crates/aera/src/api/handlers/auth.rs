//! Authentication handlers.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::auth::AuthError;
use crate::user::{User, UserInfo};

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

/// Password login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Signup request.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub name: Option<String>,
}

/// Google sign-in request. The client has already completed the OAuth flow.
#[derive(Debug, Deserialize)]
pub struct GoogleLoginRequest {
    pub email: String,
    pub name: Option<String>,
}

/// Response for every successful sign-in.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: UserInfo,
}

fn auth_response(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let token = state.auth.generate_token(&user.id, &user.email)?;
    Ok(AuthResponse {
        success: true,
        token,
        user: user.into(),
    })
}

/// Log in with email and password.
#[instrument(skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let user = state
        .users
        .verify_credentials(&request.email, &request.password)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    info!(user_id = %user.id, "User logged in");
    Ok(Json(auth_response(&state, user)?))
}

/// Create a password account and log it in.
#[instrument(skip(state, request))]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .users
        .register(&request.email, &request.password, request.name)
        .await?;

    Ok((StatusCode::CREATED, Json(auth_response(&state, user)?)))
}

/// Log in through Google, creating the account on first use.
#[instrument(skip(state, request))]
pub async fn google_login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<GoogleLoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = state
        .users
        .sign_in_with_google(&request.email, request.name)
        .await?;

    info!(user_id = %user.id, "User signed in with Google");
    Ok(Json(auth_response(&state, user)?))
}
