//! Local model process backend.
//!
//! Each request spawns one process, writes a single JSON payload to its
//! stdin, closes it and reads stdout until exit. The process answers with
//! `{"response": "..."}` or `{"error": "..."}`.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use futures::{future, stream};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::{AiError, AiResult, FragmentStream, GenerationRequest, SubprocessConfig, TextGenerator};

#[derive(Debug, Serialize)]
struct ServicePayload<'a> {
    system_prompt: &'a str,
    conversation_history: &'a str,
    user_input: &'a str,
}

#[derive(Debug, Deserialize)]
struct ServiceReply {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Outcome of one failed attempt.
#[derive(Debug)]
enum AttemptError {
    /// The program could not run properly; the next program may work.
    Retryable(AiError),
    /// The program ran and reported a failure; retrying will not help.
    Fatal(AiError),
}

/// Backend that shells out to a local model process.
#[derive(Debug, Clone)]
pub struct SubprocessBackend {
    programs: Vec<String>,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    timeout: Duration,
}

impl SubprocessBackend {
    pub fn from_config(config: &SubprocessConfig) -> Self {
        Self {
            programs: config.programs.clone(),
            args: config.args.clone(),
            working_dir: config
                .working_dir
                .as_deref()
                .map(|dir| PathBuf::from(shellexpand::tilde(dir).into_owned())),
            env: config.env.clone(),
            timeout: config.timeout(),
        }
    }

    async fn run_attempt(&self, program: &str, payload: &[u8]) -> Result<String, AttemptError> {
        let mut cmd = Command::new(program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        debug!("Spawning {} {:?}", program, self.args);

        let mut child = cmd.spawn().map_err(|e| {
            AttemptError::Retryable(AiError::BackendUnavailable(format!(
                "failed to start {}: {}",
                program, e
            )))
        })?;

        let stdin = child.stdin.take();
        // Dropping this future on timeout drops the child, which kills it.
        let attempt = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(payload).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                        debug!("{} closed stdin before reading the payload", program);
                    }
                    Err(e) => return Err(e),
                }
            }
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(AttemptError::Retryable(AiError::BackendUnavailable(
                    format!("I/O error talking to {}: {}", program, e),
                )));
            }
            Err(_) => {
                warn!(program = %program, timeout = ?self.timeout, "Model process timed out and was killed");
                return Err(AttemptError::Retryable(AiError::BackendTimeout(self.timeout)));
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(program = %program, stderr = %stderr.trim(), "Model process stderr");
        }

        if !output.status.success() {
            return Err(AttemptError::Retryable(AiError::BackendUnavailable(
                format!("{} exited with {}", program, output.status),
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Err(AttemptError::Retryable(AiError::BackendUnavailable(
                format!("{} produced no output", program),
            )));
        }

        let reply = parse_reply(stdout).ok_or_else(|| {
            AttemptError::Fatal(AiError::GenerationFailed(
                "model process output is not valid JSON".to_string(),
            ))
        })?;

        match reply {
            ServiceReply {
                response: Some(text),
                ..
            } if !text.trim().is_empty() => Ok(text),
            ServiceReply {
                error: Some(error), ..
            } => Err(AttemptError::Fatal(AiError::GenerationFailed(error))),
            _ => Err(AttemptError::Fatal(AiError::GenerationFailed(
                "model process returned no response".to_string(),
            ))),
        }
    }
}

/// Parse the reply, tolerating log lines printed before the JSON.
fn parse_reply(stdout: &str) -> Option<ServiceReply> {
    serde_json::from_str(stdout).ok().or_else(|| {
        stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .and_then(|line| serde_json::from_str(line).ok())
    })
}

#[async_trait]
impl TextGenerator for SubprocessBackend {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    #[instrument(skip(self, request), fields(backend = "subprocess"))]
    async fn generate(&self, request: &GenerationRequest) -> AiResult<FragmentStream> {
        let user_input = request
            .user_input()
            .ok_or_else(|| AiError::GenerationFailed("no user message to answer".to_string()))?;

        let payload = serde_json::to_vec(&ServicePayload {
            system_prompt: &request.system_prompt,
            conversation_history: &request.conversation_history,
            user_input,
        })
        .map_err(|e| AiError::GenerationFailed(format!("failed to encode payload: {}", e)))?;

        let mut last_error = None;
        for program in &self.programs {
            match self.run_attempt(program, &payload).await {
                Ok(text) => {
                    info!(program = %program, chars = text.chars().count(), "Model process answered");
                    return Ok(Box::pin(stream::once(future::ready(Ok(text)))));
                }
                Err(AttemptError::Retryable(err)) => {
                    warn!(program = %program, error = %err, "Model process attempt failed");
                    last_error = Some(err);
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AiError::BackendUnavailable("no model programs configured".to_string())
        }))
    }
}
