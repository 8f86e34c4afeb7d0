//! Chat turn orchestration.
//!
//! A turn moves through these phases:
//!
//! 1. validate the message list
//! 2. resolve (or create) the conversation
//! 3. persist the user message
//! 4. title the conversation from its first message
//! 5. generate, relaying fragments while accumulating them
//! 6. persist the accumulated assistant text, full or partial
//! 7. report the outcome
//!
//! Steps 1 to 5 run in [`ChatOrchestrator::begin`] so that request errors
//! surface before any response body is sent. Steps 5 to 7 run in
//! [`PendingReply::relay`], normally on a detached task so they finish even if
//! the client goes away.

mod error;
mod orchestrator;

pub use error::ChatError;
pub use orchestrator::{ChatOrchestrator, ChatOutcome, ChatRequest, PendingReply, derive_title};
