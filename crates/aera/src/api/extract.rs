//! Request extractors.

use axum::extract::FromRequest;

use super::error::ApiError;

/// `axum::Json` whose rejections come back as structured `ApiError`s.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
