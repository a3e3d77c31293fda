//! Error taxonomy
//!
//! Only two failures are fatal to a run: the interaction target cannot be
//! opened, and cancellation. Everything else is recorded (failed scan rows,
//! skipped descriptor lines) and the run continues.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    /// The interaction target could not be opened; nothing can proceed
    #[error("failed to open interaction target {path}")]
    TargetOpen { path: PathBuf },

    /// An instruction could not be submitted to the session
    #[error("failed to submit instruction for {target}")]
    Submit { target: String },

    /// A scanner process could not be spawned or exited abnormally
    #[error("{scanner} invocation failed: {reason}")]
    ScannerInvocation { scanner: String, reason: String },

    /// A scanner produced output this crate cannot interpret
    #[error("{scanner} produced an unreadable report: {reason}")]
    ScannerParse { scanner: String, reason: String },

    /// A target descriptor line is not `file|function`
    #[error("malformed target descriptor: '{line}'")]
    DescriptorParse { line: String },

    /// The run was cancelled
    #[error("run cancelled")]
    Cancelled,
}

impl ProbeError {
    /// Fatal errors abort the whole run; the rest degrade to recorded failures
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TargetOpen { .. } | Self::Cancelled)
    }
}
