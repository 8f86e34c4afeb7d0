//! Chat orchestrator.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::ChatError;
use crate::ai::{
    AiError, ChatTurn, FragmentStream, GenerationRequest, TextGenerator, default_system_prompt,
};
use crate::conversation::{
    ConversationRepository, DEFAULT_CONVERSATION_TITLE, MAX_MESSAGE_CHARS, MessageRole,
};
use crate::user::UserService;

/// Longest auto-derived title, before the ellipsis.
const TITLE_MAX_CHARS: usize = 30;

/// Title for a conversation whose first message is `text`.
pub fn derive_title(text: &str) -> String {
    if text.chars().count() <= TITLE_MAX_CHARS {
        return text.to_string();
    }
    let mut title: String = text.chars().take(TITLE_MAX_CHARS).collect();
    title.push('…');
    title
}

/// A request to continue (or start) a conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Existing conversation; `None` starts a new one.
    #[serde(default, alias = "conversationId")]
    pub conversation_id: Option<String>,
    /// Full message list. The last entry must be the user's new message.
    pub messages: Vec<ChatTurn>,
}

/// How a chat turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// Backend finished; the whole reply is stored.
    Completed { chars: usize },
    /// Backend failed after producing text; that text is stored.
    PartiallyCompleted { chars: usize, error: String },
    /// Nothing usable was produced, or the reply could not be stored.
    Failed { error: String },
    /// The client went away; whatever arrived before that is stored.
    Abandoned { chars: usize },
}

impl ChatOutcome {
    /// Characters of assistant text written to the store.
    pub fn persisted_chars(&self) -> usize {
        match self {
            Self::Completed { chars }
            | Self::PartiallyCompleted { chars, .. }
            | Self::Abandoned { chars } => *chars,
            Self::Failed { .. } => 0,
        }
    }
}

impl fmt::Display for ChatOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { .. } => write!(f, "completed"),
            Self::PartiallyCompleted { .. } => write!(f, "partially_completed"),
            Self::Failed { .. } => write!(f, "failed"),
            Self::Abandoned { .. } => write!(f, "abandoned"),
        }
    }
}

/// Ties the store, the user profile and the text generator together.
#[derive(Clone)]
pub struct ChatOrchestrator {
    conversations: ConversationRepository,
    users: UserService,
    backend: Arc<dyn TextGenerator>,
}

impl ChatOrchestrator {
    pub fn new(
        conversations: ConversationRepository,
        users: UserService,
        backend: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            conversations,
            users,
            backend,
        }
    }

    /// The configured text generator.
    pub fn backend(&self) -> &Arc<dyn TextGenerator> {
        &self.backend
    }

    /// Validate, store the user message and start generating.
    ///
    /// Once this returns `Ok` or `Err(ChatError::Generation { .. })`, the
    /// user message is stored.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn begin(&self, user_id: &str, request: ChatRequest) -> Result<PendingReply, ChatError> {
        validate_messages(&request.messages)?;

        let conversation = match request
            .conversation_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            Some(raw) => {
                let id = Uuid::parse_str(raw).map_err(|_| {
                    ChatError::InvalidRequest(format!("Invalid conversation id: {}", raw))
                })?;
                self.conversations
                    .get_owned(&id.to_string(), user_id)
                    .await?
                    .ok_or_else(|| ChatError::NotFound(format!("Conversation not found: {}", raw)))?
            }
            None => {
                self.conversations
                    .create(user_id, DEFAULT_CONVERSATION_TITLE)
                    .await?
            }
        };
        let conversation_id = conversation.id;

        let Some(user_turn) = request.messages.last() else {
            return Err(ChatError::InvalidRequest("At least one message is required".to_string()));
        };
        self.conversations
            .append_message(&conversation_id, MessageRole::User, &user_turn.content)
            .await?;

        if self.conversations.count_messages(&conversation_id).await? == 1 {
            let title = derive_title(&user_turn.content);
            self.conversations
                .rename(&conversation_id, user_id, &title)
                .await?;
        }

        let system_prompt = match self.users.get_user(user_id).await? {
            Some(user) => default_system_prompt(&user.name, &user.pre_prompt),
            None => default_system_prompt("User", ""),
        };
        let generation = GenerationRequest::from_turns(system_prompt, request.messages);

        let fragments = self.backend.generate(&generation).await.map_err(|source| {
            warn!(
                conversation_id = %conversation_id,
                backend = self.backend.name(),
                error = %source,
                "Generation failed before any output"
            );
            ChatError::Generation {
                conversation_id: conversation_id.clone(),
                source,
            }
        })?;

        Ok(PendingReply {
            conversation_id,
            fragments,
            conversations: self.conversations.clone(),
        })
    }
}

fn validate_messages(messages: &[ChatTurn]) -> Result<(), ChatError> {
    let last = messages
        .last()
        .ok_or_else(|| ChatError::InvalidRequest("At least one message is required".to_string()))?;

    if last.role != MessageRole::User {
        return Err(ChatError::InvalidRequest(
            "The last message must be from the user".to_string(),
        ));
    }

    if last.content.trim().is_empty() {
        return Err(ChatError::InvalidRequest(
            "Message content must not be empty".to_string(),
        ));
    }

    if messages
        .iter()
        .any(|turn| turn.content.chars().count() > MAX_MESSAGE_CHARS)
    {
        return Err(ChatError::InvalidRequest(format!(
            "Message content must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    Ok(())
}

/// A started generation whose output still has to be relayed and stored.
pub struct PendingReply {
    conversation_id: String,
    fragments: FragmentStream,
    conversations: ConversationRepository,
}

impl PendingReply {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Forward fragments to `sink` while accumulating them, then store the
    /// accumulated text.
    ///
    /// A backend failure is sent to `sink` as the final item, after the
    /// partial reply is stored. Once `sink` is closed, even while the backend
    /// is silent, the backend stream is dropped and whatever arrived so far
    /// is stored.
    pub async fn relay(self, sink: mpsc::Sender<Result<String, ChatError>>) -> ChatOutcome {
        let Self {
            conversation_id,
            mut fragments,
            conversations,
        } = self;

        let mut assistant_response = String::new();
        let mut failure: Option<AiError> = None;
        let mut abandoned = false;

        loop {
            // A stalled backend must not keep a departed client's turn open.
            let item = tokio::select! {
                biased;
                item = fragments.next() => item,
                _ = sink.closed() => {
                    abandoned = true;
                    break;
                }
            };

            match item {
                Some(Ok(fragment)) if fragment.is_empty() => {}
                Some(Ok(fragment)) => {
                    assistant_response.push_str(&fragment);
                    if sink.send(Ok(fragment)).await.is_err() {
                        abandoned = true;
                        break;
                    }
                }
                Some(Err(e)) => {
                    failure = Some(e);
                    break;
                }
                None => break,
            }
        }
        drop(fragments);

        let chars = assistant_response.chars().count();
        let outcome = match persist_reply(&conversations, &conversation_id, &assistant_response).await {
            Err(e) => {
                error!(conversation_id = %conversation_id, error = %e, "Failed to store assistant reply");
                let outcome = ChatOutcome::Failed {
                    error: e.to_string(),
                };
                let _ = sink.send(Err(ChatError::Store(e))).await;
                outcome
            }
            Ok(()) => match failure {
                Some(source) => {
                    let outcome = if chars > 0 {
                        ChatOutcome::PartiallyCompleted {
                            chars,
                            error: source.to_string(),
                        }
                    } else {
                        ChatOutcome::Failed {
                            error: source.to_string(),
                        }
                    };
                    let _ = sink
                        .send(Err(ChatError::Generation {
                            conversation_id: conversation_id.clone(),
                            source,
                        }))
                        .await;
                    outcome
                }
                None if abandoned => ChatOutcome::Abandoned { chars },
                None => {
                    if chars == 0 {
                        warn!(conversation_id = %conversation_id, "Backend finished without producing text");
                    }
                    ChatOutcome::Completed { chars }
                }
            },
        };

        info!(
            conversation_id = %conversation_id,
            outcome = %outcome,
            chars = outcome.persisted_chars(),
            "Chat turn finished"
        );
        outcome
    }
}

/// Store the assistant text (if any) and bump the conversation.
async fn persist_reply(
    conversations: &ConversationRepository,
    conversation_id: &str,
    text: &str,
) -> anyhow::Result<()> {
    if !text.is_empty() {
        conversations
            .append_message(conversation_id, MessageRole::Assistant, text)
            .await?;
    }
    conversations.touch(conversation_id).await
}
