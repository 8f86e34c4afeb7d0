//! AI backend configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default endpoint of the streaming completion service.
pub const DEFAULT_AI_ENDPOINT: &str = "http://localhost:3000";

/// Which generation strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI-compatible `/chat/completions` endpoint with `stream: true`.
    #[default]
    Http,
    /// Local model process speaking JSON over stdin/stdout.
    Subprocess,
}

/// AI backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub backend: BackendKind,
    /// Base URL of the completion service.
    pub endpoint: String,
    /// Seconds to wait for the completion service to start answering.
    pub timeout_secs: u64,
    /// Model name forwarded in the request body.
    pub model: Option<String>,
    /// Bearer token for the completion service. Supports `env:VAR_NAME`.
    pub api_key: Option<String>,
    pub subprocess: SubprocessConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Http,
            endpoint: DEFAULT_AI_ENDPOINT.to_string(),
            timeout_secs: 60,
            model: None,
            api_key: None,
            subprocess: SubprocessConfig::default(),
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Apply the `AI_ENDPOINT_URL` / `AI_TIMEOUT_SECONDS` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var("AI_ENDPOINT_URL").ok(),
            std::env::var("AI_TIMEOUT_SECONDS").ok(),
        );
    }

    fn apply_overrides(&mut self, endpoint: Option<String>, timeout: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            self.endpoint = endpoint.trim().to_string();
        }

        if let Some(raw) = timeout {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.timeout_secs = secs,
                _ => warn!(value = %raw, "Ignoring invalid AI_TIMEOUT_SECONDS"),
            }
        }
    }
}

/// Settings for the local model process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubprocessConfig {
    /// Program names tried in order until one runs successfully.
    pub programs: Vec<String>,
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    /// Seconds before a running attempt is killed.
    pub timeout_secs: u64,
    /// Extra environment, e.g. `MODEL_PATH`.
    pub env: BTreeMap<String, String>,
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            programs: vec!["python".into(), "python3".into(), "py".into()],
            args: vec!["main.py".into(), "--service".into()],
            working_dir: None,
            timeout_secs: 15,
            env: BTreeMap::new(),
        }
    }
}

impl SubprocessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
