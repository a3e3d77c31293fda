//! Semgrep adapter
//!
//! Semgrep runs against a per-CWE rule config resolved from a rules
//! directory (`<rules_dir>/cwe-<id>.yaml`), with `--json` for the report.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::scanner::{ExternalScanner, RawReport};
use crate::domain::{Confidence, Severity, VulnerabilityRecord, WeaknessClass};
use crate::error::ProbeError;

#[derive(Debug)]
pub struct SemgrepScanner {
    binary: String,
    rules_dir: PathBuf,
}

impl SemgrepScanner {
    pub fn new(binary: impl Into<String>, rules_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            rules_dir: rules_dir.into(),
        }
    }

    fn rules_path(&self, weakness: &WeaknessClass) -> Option<PathBuf> {
        for ext in ["yaml", "yml"] {
            let path = self.rules_dir.join(format!("cwe-{}.{ext}", weakness.id()));
            if path.exists() {
                return Some(path);
            }
        }
        None
    }
}

#[derive(Deserialize)]
struct SemgrepReport {
    #[serde(default)]
    results: Vec<SemgrepResult>,
    #[serde(default)]
    errors: Vec<SemgrepError>,
}

#[derive(Deserialize)]
struct SemgrepResult {
    start: SemgrepPos,
    #[serde(default)]
    end: Option<SemgrepPos>,
    #[serde(default)]
    extra: SemgrepExtra,
}

#[derive(Deserialize)]
struct SemgrepPos {
    #[serde(default)]
    line: u32,
}

#[derive(Deserialize, Default)]
struct SemgrepExtra {
    #[serde(default)]
    message: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    metadata: SemgrepMetadata,
}

#[derive(Deserialize, Default)]
struct SemgrepMetadata {
    #[serde(default)]
    confidence: String,
}

#[derive(Deserialize)]
struct SemgrepError {
    #[serde(default)]
    message: String,
}

impl ExternalScanner for SemgrepScanner {
    fn id(&self) -> &'static str {
        "semgrep"
    }

    fn binary(&self) -> &str {
        if self.binary.is_empty() {
            "semgrep"
        } else {
            &self.binary
        }
    }

    fn supports(&self, weakness: &WeaknessClass) -> bool {
        self.rules_path(weakness).is_some()
    }

    fn invocation(&self, file: &Path, weakness: &WeaknessClass) -> Option<Vec<String>> {
        let rules = self.rules_path(weakness)?;
        Some(vec![
            self.binary().to_string(),
            "scan".into(),
            "--json".into(),
            "--quiet".into(),
            "--config".into(),
            rules.to_string_lossy().into_owned(),
            file.to_string_lossy().into_owned(),
        ])
    }

    fn parse(
        &self,
        report: &RawReport,
        file: &str,
        weakness: &WeaknessClass,
    ) -> Result<Vec<VulnerabilityRecord>, ProbeError> {
        let parsed: SemgrepReport =
            serde_json::from_str(&report.body).map_err(|err| ProbeError::ScannerParse {
                scanner: self.id().to_string(),
                reason: err.to_string(),
            })?;

        if let Some(first) = parsed.errors.first() {
            return Err(ProbeError::ScannerParse {
                scanner: self.id().to_string(),
                reason: format!("report carries errors: {}", first.message),
            });
        }

        Ok(parsed
            .results
            .into_iter()
            .map(|r| {
                let mut record = VulnerabilityRecord::finding(
                    weakness.clone(),
                    file,
                    r.start.line,
                    self.id(),
                    r.extra.severity.parse().unwrap_or(Severity::Medium),
                    r.extra
                        .metadata
                        .confidence
                        .parse()
                        .unwrap_or(Confidence::Medium),
                    r.extra.message,
                );
                if let Some(end) = r.end {
                    record.line_end = end.line.max(record.line_start);
                }
                record
            })
            .collect())
    }
}
