//! Streaming HTTP backend for OpenAI-compatible completion services.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::retry::Never;
use reqwest_eventsource::{Error as EventSourceError, EventSource};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::config::AiConfig;
use super::{AiError, AiResult, ChatTurn, FragmentStream, GenerationRequest, TextGenerator};
use crate::auth::resolve_env_reference;
use crate::conversation::MessageRole;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<&'a ChatTurn>,
    stream: bool,
}

/// Backend that streams from `{endpoint}/chat/completions`.
#[derive(Debug, Clone)]
pub struct HttpStreamBackend {
    client: Client,
    completions_url: String,
    model: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpStreamBackend {
    /// Create a backend for `endpoint`.
    ///
    /// `timeout` bounds connecting and waiting for response headers; the
    /// body may stream for as long as the service keeps sending.
    pub fn new(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            completions_url: format!("{}/chat/completions", endpoint.trim_end_matches('/')),
            model: None,
            api_key: None,
            timeout,
        })
    }

    pub fn from_config(config: &AiConfig) -> anyhow::Result<Self> {
        let mut backend = Self::new(&config.endpoint, config.timeout())?;
        backend.model = config.model.clone();
        backend.api_key = config
            .api_key
            .as_deref()
            .map(resolve_env_reference)
            .transpose()
            .context("Failed to resolve ai.api_key")?;
        Ok(backend)
    }

    pub fn completions_url(&self) -> &str {
        &self.completions_url
    }

    /// Map a failure to open the stream onto the backend error taxonomy.
    ///
    /// Anything but `200 OK` with an event-stream body is unavailable.
    async fn open_error(&self, error: EventSourceError) -> AiError {
        match error {
            EventSourceError::InvalidStatusCode(status, response) => {
                let detail = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %detail, "Completion service returned an error status");
                AiError::BackendUnavailable(format!("completion service returned {}", status))
            }
            EventSourceError::InvalidContentType(content_type, _) => {
                warn!(content_type = ?content_type, "Completion service did not return an event stream");
                AiError::BackendUnavailable(format!(
                    "completion service returned content type {:?}",
                    content_type
                ))
            }
            EventSourceError::Transport(e) if e.is_timeout() => AiError::BackendTimeout(self.timeout),
            other => {
                warn!(error = %other, "Completion request failed");
                AiError::BackendUnavailable(other.to_string())
            }
        }
    }
}

#[async_trait]
impl TextGenerator for HttpStreamBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    #[instrument(skip(self, request), fields(backend = "http", url = %self.completions_url))]
    async fn generate(&self, request: &GenerationRequest) -> AiResult<FragmentStream> {
        // A lone turn carries no context of its own; fold the rendered history in.
        let mut system_prompt = request.system_prompt.clone();
        if request.messages.len() <= 1 && !request.conversation_history.trim().is_empty() {
            system_prompt.push_str("\n\nConversation so far:\n");
            system_prompt.push_str(&request.conversation_history);
        }
        let system_turn = ChatTurn::new(MessageRole::System, system_prompt);
        let mut messages: Vec<&ChatTurn> = Vec::with_capacity(request.messages.len() + 1);
        let has_system = request
            .messages
            .first()
            .is_some_and(|turn| turn.role == MessageRole::System);
        if !has_system && !system_turn.content.trim().is_empty() {
            messages.push(&system_turn);
        }
        messages.extend(request.messages.iter());

        let body = CompletionRequest {
            model: self.model.as_deref(),
            messages,
            stream: true,
        };

        let mut builder = self.client.post(&self.completions_url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let mut events = EventSource::new(builder)
            .map_err(|e| AiError::BackendUnavailable(format!("cannot build request: {}", e)))?;
        // A failed completion is reported, never replayed.
        events.set_retry_policy(Box::new(Never));

        match tokio::time::timeout(self.timeout, events.next()).await {
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) => {
                events.close();
                return Err(self.open_error(e).await);
            }
            Ok(None) => {
                return Err(AiError::BackendUnavailable(
                    "completion stream closed before opening".to_string(),
                ));
            }
            Err(_) => {
                events.close();
                return Err(AiError::BackendTimeout(self.timeout));
            }
        }

        debug!("Completion stream opened");
        Ok(super::fragment_stream(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url_joins_cleanly() {
        let backend = HttpStreamBackend::new("http://localhost:3000/", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.completions_url(), "http://localhost:3000/chat/completions");

        let backend = HttpStreamBackend::new("http://host/v1", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.completions_url(), "http://host/v1/chat/completions");
    }

    #[test]
    fn test_request_body_shape() {
        let turns = [ChatTurn::new(MessageRole::User, "hi")];
        let body = CompletionRequest {
            model: None,
            messages: turns.iter().collect(),
            stream: true,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"messages": [{"role": "user", "content": "hi"}], "stream": true})
        );
    }
}
