//! Chat session and AI reply handlers.

use std::io;

use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::ai::{AiError, ChatTurn, GenerationRequest, default_system_prompt};
use crate::auth::CurrentUser;
use crate::chat::ChatRequest;
use crate::conversation::{
    Conversation, DEFAULT_CONVERSATION_TITLE, MAX_MESSAGE_CHARS, MAX_TITLE_CHARS, Message,
    MessageRole,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

/// Response header naming the conversation a streamed reply belongs to.
pub const CONVERSATION_ID_HEADER: &str = "x-conversation-id";

/// Fragments buffered between the generation task and the response body.
const RELAY_BUFFER: usize = 32;

/// Parse a path or body conversation id.
pub(super) fn parse_conversation_id(raw: &str) -> ApiResult<String> {
    Uuid::parse_str(raw.trim())
        .map(|id| id.to_string())
        .map_err(|_| ApiError::bad_request(format!("Invalid conversation id: {}", raw)))
}

/// Load a conversation, treating other users' conversations as absent.
pub(super) async fn owned_conversation(
    state: &AppState,
    raw_id: &str,
    user: &CurrentUser,
) -> ApiResult<Conversation> {
    let id = parse_conversation_id(raw_id)?;
    state
        .conversations
        .get_owned(&id, user.id())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Conversation not found: {}", raw_id)))
}

/// Trim a client-supplied title and check its length.
pub(super) fn validate_title(raw: &str) -> ApiResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ApiError::bad_request(format!(
            "Title must be at most {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(title.to_string())
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

/// Optional body for creating a session.
#[derive(Debug, Default, Deserialize)]
pub struct NewSessionRequest {
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewSessionResponse {
    pub success: bool,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Start an empty conversation.
#[instrument(skip(state, user, body), fields(user_id = %user.id()))]
pub async fn create_session(
    State(state): State<AppState>,
    user: CurrentUser,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<NewSessionResponse>)> {
    let request: NewSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        NewSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?
    };

    let title = match request.title.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_CONVERSATION_TITLE.to_string(),
        Some(title) => validate_title(title)?,
    };

    let conversation = state.conversations.create(user.id(), &title).await?;
    info!(conversation_id = %conversation.id, "Created chat session");

    Ok((
        StatusCode::CREATED,
        Json(NewSessionResponse {
            success: true,
            session_id: conversation.id,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub success: bool,
    pub sessions: Vec<Conversation>,
}

/// List the caller's conversations, most recently updated first.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn list_sessions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<SessionsResponse>> {
    let sessions = state.conversations.list_for_owner(user.id()).await?;
    debug!(count = sessions.len(), "Listed chat sessions");

    Ok(Json(SessionsResponse {
        success: true,
        sessions,
    }))
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub success: bool,
    pub messages: Vec<Message>,
}

/// Messages of one conversation, oldest first.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn get_session_messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<MessagesResponse>> {
    let conversation = owned_conversation(&state, &session_id, &user).await?;
    let messages = state.conversations.list_messages(&conversation.id).await?;

    Ok(Json(MessagesResponse {
        success: true,
        messages,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RenameSessionRequest {
    pub title: String,
}

/// Rename a conversation.
#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn rename_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(session_id): Path<String>,
    ApiJson(request): ApiJson<RenameSessionRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let id = parse_conversation_id(&session_id)?;
    let title = validate_title(&request.title)?;

    if !state.conversations.rename(&id, user.id(), &title).await? {
        return Err(ApiError::not_found(format!(
            "Conversation not found: {}",
            session_id
        )));
    }

    Ok(SuccessResponse::ok())
}

/// Delete a conversation and all of its messages.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn delete_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    let id = parse_conversation_id(&session_id)?;

    if !state.conversations.delete(&id, user.id()).await? {
        return Err(ApiError::not_found(format!(
            "Conversation not found: {}",
            session_id
        )));
    }

    info!(conversation_id = %id, "Deleted chat session");
    Ok(SuccessResponse::ok())
}

/// Store a single message written by the client.
#[derive(Debug, Deserialize)]
pub struct SaveMessageRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// `user`, `ai`, `assistant` or `system`.
    #[serde(rename = "messageType")]
    pub message_type: String,
    pub content: String,
}

/// Append a message to a conversation and bump it.
#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn save_message(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<SaveMessageRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let role: MessageRole = request
        .message_type
        .parse()
        .map_err(ApiError::bad_request)?;
    validate_content(&request.content)?;

    let conversation = owned_conversation(&state, &request.session_id, &user).await?;
    state
        .conversations
        .append_message(&conversation.id, role, &request.content)
        .await?;
    state.conversations.touch(&conversation.id).await?;

    Ok(SuccessResponse::ok())
}

fn validate_content(content: &str) -> ApiResult<()> {
    if content.trim().is_empty() {
        return Err(ApiError::bad_request("Message content is required"));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::bad_request(format!(
            "Message content must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(())
}

/// One-shot AI request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiReplyRequest {
    pub message: String,
    pub system_prompt: Option<String>,
    pub conversation_history: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AiReplyResponse {
    pub success: bool,
    pub response: String,
}

/// Generate a complete reply without storing anything.
#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn ai_reply(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<AiReplyRequest>,
) -> ApiResult<Json<AiReplyResponse>> {
    validate_content(&request.message)?;

    let system_prompt = match request.system_prompt.filter(|p| !p.trim().is_empty()) {
        Some(prompt) => prompt,
        None => match state.users.get_user(user.id()).await? {
            Some(profile) => default_system_prompt(&profile.name, &profile.pre_prompt),
            None => return Err(ApiError::not_found("User not found")),
        },
    };

    let generation = GenerationRequest {
        system_prompt,
        conversation_history: request.conversation_history.unwrap_or_default(),
        messages: vec![ChatTurn::new(MessageRole::User, request.message)],
    };

    let reply = state.chat.backend().complete(&generation).await?;
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(AiError::GenerationFailed("empty reply".to_string()).into());
    }

    Ok(Json(AiReplyResponse {
        success: true,
        response: reply.to_string(),
    }))
}

/// Stream an assistant reply as chunked plain text.
///
/// The user message is stored before generation starts. The reply is stored
/// when generation ends, including when it fails part way or the client
/// disconnects; a mid-stream failure aborts the body after that.
#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn stream_chat(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<ChatRequest>,
) -> ApiResult<Response> {
    let reply = state.chat.begin(user.id(), request).await?;
    let conversation_id = reply.conversation_id().to_string();

    let (tx, rx) = mpsc::channel(RELAY_BUFFER);
    tokio::spawn(reply.relay(tx));

    let body = Body::from_stream(ReceiverStream::new(rx).map(|item| {
        item.map(Bytes::from)
            .map_err(|e| io::Error::other(e.to_string()))
    }));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(CONVERSATION_ID_HEADER, conversation_id)
        .body(body)
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}
