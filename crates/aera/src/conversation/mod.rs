//! Conversations and their messages.
//!
//! Every read or write that starts from a caller-supplied conversation id goes
//! through [`ConversationRepository::get_owned`] (or an owner-filtered query)
//! first, so one user can never observe another user's conversations.

mod models;
mod repository;

pub use models::{Conversation, Message, MessageRole};
pub use repository::ConversationRepository;

/// Title given to conversations before their first message arrives.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Chat";

/// Longest title accepted from a client.
pub const MAX_TITLE_CHARS: usize = 200;

/// Longest message body accepted from a client.
pub const MAX_MESSAGE_CHARS: usize = 10_000;
