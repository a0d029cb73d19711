//! Shell command provider
//!
//! Runs a local CLI (for example `claude -p` or `ollama run llama3`), writes the
//! flattened prompt to its stdin and reads the reply from stdout.

use crate::{CompletionRequest, CompletionResponse, LLMError, LLMProvider, Result, StopReason, TokenUsage};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Configuration for a command-line backend
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Program to execute
    pub command: String,

    /// Arguments passed before the prompt is piped in
    pub args: Vec<String>,

    /// Seconds to wait before killing the process
    pub timeout_secs: u64,
}

impl CliConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            timeout_secs: 120,
        }
    }

    /// Parse a whitespace separated command line such as `"claude -p"`
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let command = parts
            .next()
            .ok_or_else(|| LLMError::ConfigurationError("empty CLI command".to_string()))?;
        Ok(Self {
            command,
            args: parts.collect(),
            timeout_secs: 120,
        })
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Provider backed by a local executable
pub struct CliProvider {
    config: CliConfig,
}

impl CliProvider {
    pub fn new(config: CliConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CliConfig {
        &self.config
    }
}

#[async_trait]
impl LLMProvider for CliProvider {
    #[instrument(skip(self, request), fields(command = %self.config.command))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let prompt = request.transcript();

        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                LLMError::ConfigurationError(format!(
                    "failed to spawn '{}': {e}",
                    self.config.command
                ))
            })?;

        let stdin = child.stdin.take();
        let payload = prompt.clone().into_bytes();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            // stdin is dropped on return, which ends the prompt
            match stdin.write_all(&payload).await {
                // backend exited without reading stdin
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };

        // deadline covers both feeding the prompt and collecting the reply
        let (fed, output) = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            async { tokio::join!(feed, child.wait_with_output()) },
        )
        .await
        .map_err(|_| LLMError::Timeout(self.config.timeout_secs))?;

        let output = output.map_err(|e| LLMError::CommandFailed(e.to_string()))?;
        fed.map_err(|e| LLMError::CommandFailed(format!("writing prompt: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(status = ?output.status.code(), "CLI backend exited with error");
            return Err(LLMError::CommandFailed(format!(
                "{} exited with {}: {stderr}",
                self.config.command, output.status
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(chars = text.len(), "CLI backend replied");

        Ok(CompletionResponse {
            usage: TokenUsage::estimate(&prompt, &text),
            text,
            stop_reason: StopReason::EndTurn,
        })
    }

    fn name(&self) -> &str {
        "cli"
    }
}
