//! AI backend errors.

use std::time::Duration;

use thiserror::Error;

/// Failure to obtain text from a generation backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AiError {
    /// The backend could not be reached, answered with a non-success status,
    /// or the connection dropped mid-stream.
    #[error("AI backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Generation did not finish within the allotted time.
    #[error("AI backend timed out after {}s", .0.as_secs_f64())]
    BackendTimeout(Duration),

    /// The backend answered, but with an error payload or unusable output.
    #[error("generation failed: {0}")]
    GenerationFailed(String),
}

/// Result type for AI backend calls.
pub type AiResult<T> = Result<T, AiError>;
