//! Completion chunks carried over server-sent events.

use futures::StreamExt;
use futures::stream::unfold;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use serde::Deserialize;
use tracing::debug;

use super::{AiError, FragmentStream};

/// Data payload that ends a completion stream.
const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Extract `choices[0].delta.content` from a chunk.
///
/// Malformed JSON and chunks without text (role announcements, finish
/// reasons) both yield `None`.
fn delta_content(data: &str) -> Option<String> {
    let chunk: CompletionChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!(error = %e, "Skipping malformed stream chunk");
            return None;
        }
    };

    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty())
}

/// Turn an opened event source into a stream of text fragments.
///
/// The stream ends at `[DONE]` or when the body ends. Any other error is
/// yielded once as [`AiError::BackendUnavailable`] and ends the stream. The
/// event source is closed in every case, so it never reconnects.
pub fn fragment_stream(events: EventSource) -> FragmentStream {
    Box::pin(unfold(Some(events), |state| async move {
        let mut events = state?;
        loop {
            match events.next().await {
                Some(Ok(Event::Open)) => {}
                Some(Ok(Event::Message(message))) => {
                    if message.data.trim() == DONE_MARKER {
                        events.close();
                        return None;
                    }
                    if let Some(content) = delta_content(&message.data) {
                        return Some((Ok(content), Some(events)));
                    }
                }
                Some(Err(EventSourceError::StreamEnded)) | None => {
                    events.close();
                    return None;
                }
                Some(Err(e)) => {
                    events.close();
                    let error = AiError::BackendUnavailable(format!("stream interrupted: {}", e));
                    return Some((Err(error), None));
                }
            }
        }
    }))
}
