//! UUID-keyed conversation endpoints returning bare JSON values.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::auth::CurrentUser;
use crate::conversation::{Conversation, Message};

use super::chat::{owned_conversation, validate_title};
use crate::api::error::ApiResult;
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub title: String,
}

/// Create a conversation with an explicit title.
#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn create_conversation(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateConversationRequest>,
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    let title = validate_title(&request.title)?;
    let conversation = state.conversations.create(user.id(), &title).await?;
    info!(conversation_id = %conversation.id, "Created conversation");

    Ok((StatusCode::CREATED, Json(conversation)))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn list_conversations(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<Conversation>>> {
    Ok(Json(state.conversations.list_for_owner(user.id()).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn conversation_messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(conversation_id): Path<String>,
) -> ApiResult<Json<Vec<Message>>> {
    let conversation = owned_conversation(&state, &conversation_id, &user).await?;
    Ok(Json(
        state.conversations.list_messages(&conversation.id).await?,
    ))
}
