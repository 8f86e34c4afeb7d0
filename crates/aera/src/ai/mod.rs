//! Text generation backends.
//!
//! The orchestrator talks to a single [`TextGenerator`]. Two implementations
//! are selected by configuration:
//! - [`SubprocessBackend`]: spawns a local model process per request and
//!   returns its whole answer at once
//! - [`HttpStreamBackend`]: posts to an OpenAI-compatible endpoint and yields
//!   fragments as server-sent events arrive

mod config;
mod error;
mod http_stream;
mod prompt;
mod sse;
mod subprocess;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

pub use config::{AiConfig, BackendKind, DEFAULT_AI_ENDPOINT, SubprocessConfig};
pub use error::{AiError, AiResult};
pub use http_stream::HttpStreamBackend;
pub use prompt::{default_system_prompt, history_text};
pub use sse::fragment_stream;
pub use subprocess::SubprocessBackend;

use crate::conversation::MessageRole;

/// Lazy, single-pass sequence of generated text fragments.
///
/// An `Err` item ends the sequence; fragments yielded before it stay valid.
pub type FragmentStream = Pin<Box<dyn Stream<Item = AiResult<String>> + Send>>;

/// One turn of the conversation as sent to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Everything a backend needs to produce the next assistant reply.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system_prompt: String,
    /// Prior turns rendered as `Human:`/`AI:` lines.
    pub conversation_history: String,
    /// Full message list; the last entry is the user turn being answered.
    pub messages: Vec<ChatTurn>,
}

impl GenerationRequest {
    /// Build a request from a message list, deriving the history text from
    /// every turn before the last.
    pub fn from_turns(system_prompt: impl Into<String>, messages: Vec<ChatTurn>) -> Self {
        let prior = messages.len().saturating_sub(1);
        Self {
            system_prompt: system_prompt.into(),
            conversation_history: history_text(&messages[..prior]),
            messages,
        }
    }

    /// Content of the trailing user turn.
    pub fn user_input(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|turn| turn.role == MessageRole::User)
            .map(|turn| turn.content.as_str())
    }
}

/// A capability that turns a prompt into assistant text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Start generating.
    ///
    /// Failures that happen before any text exists (unreachable backend,
    /// non-success status, every subprocess attempt failing) are returned
    /// here; failures after that arrive as an `Err` item in the stream.
    async fn generate(&self, request: &GenerationRequest) -> AiResult<FragmentStream>;

    /// Generate and collect the whole reply.
    async fn complete(&self, request: &GenerationRequest) -> AiResult<String> {
        let mut fragments = self.generate(request).await?;
        let mut text = String::new();
        while let Some(fragment) = fragments.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

/// Build the backend selected by `config.backend`.
pub fn backend_from_config(config: &AiConfig) -> anyhow::Result<Arc<dyn TextGenerator>> {
    let backend: Arc<dyn TextGenerator> = match config.backend {
        BackendKind::Http => Arc::new(HttpStreamBackend::from_config(config)?),
        BackendKind::Subprocess => Arc::new(SubprocessBackend::from_config(&config.subprocess)),
    };
    Ok(backend)
}
