//! API request handlers.
//!
//! - `auth`: signup, login and Google sign-in
//! - `user`: profile read and update
//! - `chat`: sessions, messages, and AI replies (plain and streamed)
//! - `conversations`: the UUID-keyed REST view of the same data
//! - `misc`: health check

mod auth;
mod chat;
mod conversations;
mod misc;
mod user;

pub use auth::{AuthResponse, GoogleLoginRequest, LoginRequest, SignupRequest, google_login, login, signup};
pub use chat::{
    AiReplyRequest, CONVERSATION_ID_HEADER, NewSessionRequest, RenameSessionRequest,
    SaveMessageRequest, ai_reply, create_session, delete_session, get_session_messages,
    list_sessions, rename_session, save_message, stream_chat,
};
pub use conversations::{
    CreateConversationRequest, conversation_messages, create_conversation, list_conversations,
};
pub use misc::{HealthResponse, health};
pub use user::{get_user_info, update_user};
