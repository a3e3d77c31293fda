//! Interaction driver seam
//!
//! The engine never talks to the assistant session directly; everything goes
//! through [`InteractionDriver`]. The production driver wraps an interactive
//! editor session (keystrokes, clipboard, window management) and lives outside
//! this crate. [`CommandDriver`] is a process-backed implementation for
//! headless setups and scripting.

mod command;

pub use command::{CommandDriver, DriverCommands};

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::domain::EditAction;

/// Contract between the orchestrator and the interactive session
#[async_trait]
pub trait InteractionDriver: Send + Sync {
    /// Open the interaction target (project/session). Failure aborts the run.
    async fn open_target(&self, path: &Path) -> bool;

    /// Submit one instruction to the assistant
    async fn submit(&self, text: &str) -> bool;

    /// Block until the assistant stops producing output, or until `timeout`
    /// elapses (`None` = wait indefinitely)
    async fn await_completion(&self, timeout: Option<Duration>) -> bool;

    /// Capture the assistant's latest response, if any
    async fn capture_output(&self) -> Option<String>;

    /// Keep or revert the assistant's pending edits
    async fn apply_or_discard_edits(&self, action: EditAction) -> bool;

    /// Discard any half-typed input before a resubmission
    async fn clear_pending_input(&self) -> bool;
}
