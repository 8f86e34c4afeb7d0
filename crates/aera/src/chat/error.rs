//! Chat orchestration errors.

use thiserror::Error;

use crate::ai::AiError;

/// Failure of a chat turn.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Malformed input: empty message list, wrong trailing role, bad id.
    #[error("{0}")]
    InvalidRequest(String),

    /// Conversation absent or owned by someone else.
    #[error("{0}")]
    NotFound(String),

    #[error("storage failure: {0:#}")]
    Store(#[from] anyhow::Error),

    /// The backend failed. The user message is already stored.
    #[error("{source}")]
    Generation {
        conversation_id: String,
        #[source]
        source: AiError,
    },
}
