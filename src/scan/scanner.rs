//! External scanner seam
//!
//! One adapter per tool: the adapter contributes the argv for a single-file
//! scan and a parser from the tool's native report to normalized records.
//! Process handling, timeouts and the exit-code contract live here so adding
//! a scanner never touches the aggregator.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::domain::{VulnerabilityRecord, WeaknessClass};
use crate::error::ProbeError;

/// Native output of one scanner invocation
#[derive(Debug, Clone)]
pub struct RawReport {
    /// The tool's structured report (JSON on stdout)
    pub body: String,
    /// Process exit code: 0 = clean, 1 = findings present, >=2 = error
    pub exit_code: i32,
}

/// Adapter for one external scanning tool
pub trait ExternalScanner: Send + Sync {
    /// Stable scanner id used in records and tables ("bandit", "semgrep")
    fn id(&self) -> &'static str;

    /// Binary probed for availability before the run
    fn binary(&self) -> &str;

    /// Whether this scanner has a rule set for the weakness class
    fn supports(&self, weakness: &WeaknessClass) -> bool;

    /// Argv for scanning a single file for the weakness class.
    /// `None` when the class is unsupported.
    fn invocation(&self, file: &Path, weakness: &WeaknessClass) -> Option<Vec<String>>;

    /// Parse the native report into normalized records.
    ///
    /// `file` is the project-relative path recorded on each record.
    fn parse(
        &self,
        report: &RawReport,
        file: &str,
        weakness: &WeaknessClass,
    ) -> Result<Vec<VulnerabilityRecord>, ProbeError>;
}

/// Run one scanner against one file, honoring the per-call timeout.
///
/// Exit codes 0 and 1 are clean runs per the scanner contract; anything else,
/// a spawn failure, or an expired timeout is an invocation error.
pub async fn run_scanner(
    scanner: &dyn ExternalScanner,
    file: &Path,
    weakness: &WeaknessClass,
    timeout: Duration,
) -> Result<RawReport, ProbeError> {
    let invocation_err = |reason: String| ProbeError::ScannerInvocation {
        scanner: scanner.id().to_string(),
        reason,
    };

    let argv = scanner
        .invocation(file, weakness)
        .ok_or_else(|| invocation_err(format!("no rule set for {weakness}")))?;
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| invocation_err("empty invocation".into()))?;

    tracing::debug!(scanner = scanner.id(), ?argv, "running scanner");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| invocation_err(format!("timed out after {}s", timeout.as_secs())))?
        .map_err(|err| invocation_err(format!("failed to spawn: {err}")))?;

    let exit_code = output.status.code().unwrap_or(-1);
    if exit_code != 0 && exit_code != 1 {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(invocation_err(format!(
            "exit code {exit_code}: {}",
            stderr.trim()
        )));
    }

    Ok(RawReport {
        body: String::from_utf8_lossy(&output.stdout).into_owned(),
        exit_code,
    })
}

/// Check that a scanner binary exists and answers `--version`
pub async fn probe_available(binary: &str) -> bool {
    let mut cmd = Command::new(binary);
    cmd.arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    matches!(
        tokio::time::timeout(Duration::from_secs(5), cmd.status()).await,
        Ok(Ok(status)) if status.success()
    )
}
