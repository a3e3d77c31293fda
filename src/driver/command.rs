//! Process-backed interaction driver
//!
//! Each driver operation maps to a configured program invocation, the way
//! agent CLIs are wrapped elsewhere: the instruction text goes to stdin, the
//! captured response comes from stdout, exit status 0 means success. This lets
//! the engine run against anything scriptable without linking UI automation
//! into this crate.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::InteractionDriver;
use crate::domain::EditAction;

/// Program + arguments for one driver operation
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DriverCommands {
    /// Invoked with the target path appended
    pub open: Vec<String>,
    /// Receives the instruction on stdin
    pub submit: Vec<String>,
    /// Polled until it exits 0 (assistant idle)
    pub await_completion: Vec<String>,
    /// Prints the captured response on stdout
    pub capture: Vec<String>,
    /// Invoked with "keep" or "revert" appended
    pub edits: Vec<String>,
    /// Clears any pending input
    pub clear_input: Vec<String>,
}

pub struct CommandDriver {
    commands: DriverCommands,
    poll_interval: Duration,
}

impl CommandDriver {
    pub fn new(commands: DriverCommands) -> Self {
        Self {
            commands,
            poll_interval: Duration::from_secs(3),
        }
    }

    fn build(spec: &[String], extra: &[&str]) -> Option<Command> {
        let (program, args) = spec.split_first()?;
        let mut cmd = Command::new(program);
        cmd.args(args).args(extra);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Some(cmd)
    }

    async fn run_ok(spec: &[String], extra: &[&str]) -> bool {
        let Some(mut cmd) = Self::build(spec, extra) else {
            tracing::error!("driver command not configured");
            return false;
        };
        match cmd.status().await {
            Ok(status) => status.success(),
            Err(err) => {
                tracing::error!(%err, program = ?spec.first(), "driver command failed to spawn");
                false
            }
        }
    }
}

#[async_trait]
impl InteractionDriver for CommandDriver {
    async fn open_target(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        Self::run_ok(&self.commands.open, &[path.as_ref()]).await
    }

    async fn submit(&self, text: &str) -> bool {
        let Some(mut cmd) = Self::build(&self.commands.submit, &[]) else {
            return false;
        };
        cmd.stdin(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                tracing::error!(%err, "submit command failed to spawn");
                return false;
            }
        };
        if let Some(mut stdin) = child.stdin.take() {
            if stdin.write_all(text.as_bytes()).await.is_err() {
                return false;
            }
            drop(stdin);
        }
        child.wait().await.map(|s| s.success()).unwrap_or(false)
    }

    async fn await_completion(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        loop {
            if Self::run_ok(&self.commands.await_completion, &[]).await {
                return true;
            }
            if let Some(deadline) = deadline {
                if tokio::time::Instant::now() >= deadline {
                    return false;
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn capture_output(&self) -> Option<String> {
        let mut cmd = Self::build(&self.commands.capture, &[])?;
        let output = match cmd.output().await {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                tracing::error!(code = ?output.status.code(), "capture command failed");
                return None;
            }
            Err(err) => {
                tracing::error!(%err, "capture command failed to spawn");
                return None;
            }
        };
        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    async fn apply_or_discard_edits(&self, action: EditAction) -> bool {
        Self::run_ok(&self.commands.edits, &[action.as_str()]).await
    }

    async fn clear_pending_input(&self) -> bool {
        Self::run_ok(&self.commands.clear_input, &[]).await
    }
}
