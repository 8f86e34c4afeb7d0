//! Authentication errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential was presented.
    #[error("missing authorization header")]
    MissingAuthHeader,

    /// A credential was presented but is not a bearer token.
    #[error("invalid authorization header format")]
    InvalidAuthHeader,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    TokenExpired,

    /// Wrong email or password at login.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("internal auth error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
}

impl AuthError {
    /// A missing credential is 401; a credential that is present but unusable is 403.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader => StatusCode::UNAUTHORIZED,
            AuthError::InvalidAuthHeader
            | AuthError::InvalidToken(_)
            | AuthError::TokenExpired => StatusCode::FORBIDDEN,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "MISSING_AUTH_HEADER",
            AuthError::InvalidAuthHeader => "INVALID_AUTH_HEADER",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Token parser details stay in the logs.
        let error = match &self {
            AuthError::InvalidToken(_) => "invalid token".to_string(),
            AuthError::Internal(_) => "internal auth error".to_string(),
            other => other.to_string(),
        };

        let body = Json(AuthErrorResponse {
            success: false,
            error,
            code: self.error_code(),
        });

        (status, body).into_response()
    }
}
