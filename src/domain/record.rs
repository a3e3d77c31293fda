//! Normalized vulnerability records
//!
//! Every scanner adapter produces records of this shape, so the aggregation
//! and statistics layers never see a scanner's native report format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{Confidence, Severity, WeaknessClass};

/// Whether a scan invocation actually ran
///
/// `Failed` means "scan did not run" and must never be conflated with a
/// successful scan that found nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    #[default]
    Success,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// One normalized finding (or aggregated group of findings) from a scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    pub weakness: WeaknessClass,
    /// File path relative to the project root
    pub file: String,
    /// First finding line (1-indexed); 0 for failed records
    pub line_start: u32,
    pub line_end: u32,
    /// Enclosing function name, when span resolution succeeded
    pub function: Option<String>,
    /// Enclosing function span (start, end), when resolved
    pub function_span: Option<(u32, u32)>,
    /// Id of the scanner that produced this record ("bandit", "semgrep", ...)
    pub scanner: String,
    pub confidence: Confidence,
    pub severity: Severity,
    /// Distinct finding descriptions, in first-seen order
    pub descriptions: Vec<String>,
    pub status: ScanStatus,
    /// Populated only when `status == Failed`
    pub failure_reason: Option<String>,
    /// Number of raw findings folded into this record
    pub finding_count: u32,
    /// Deduplicated, sorted finding line numbers
    pub finding_lines: BTreeSet<u32>,
}

impl VulnerabilityRecord {
    /// A successful single finding
    pub fn finding(
        weakness: WeaknessClass,
        file: impl Into<String>,
        line: u32,
        scanner: impl Into<String>,
        severity: Severity,
        confidence: Confidence,
        description: impl Into<String>,
    ) -> Self {
        let description = description.into();
        Self {
            weakness,
            file: file.into(),
            line_start: line,
            line_end: line,
            function: None,
            function_span: None,
            scanner: scanner.into(),
            confidence,
            severity,
            descriptions: if description.is_empty() {
                Vec::new()
            } else {
                vec![description]
            },
            status: ScanStatus::Success,
            failure_reason: None,
            finding_count: 1,
            finding_lines: BTreeSet::from([line]),
        }
    }

    /// A failed-scan marker record: the scan did not run for this file
    pub fn failed(
        weakness: WeaknessClass,
        file: impl Into<String>,
        scanner: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            weakness,
            file: file.into(),
            line_start: 0,
            line_end: 0,
            function: None,
            function_span: None,
            scanner: scanner.into(),
            confidence: Confidence::default(),
            severity: Severity::default(),
            descriptions: Vec::new(),
            status: ScanStatus::Failed,
            failure_reason: Some(reason.into()),
            finding_count: 0,
            finding_lines: BTreeSet::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == ScanStatus::Failed
    }

    /// Fold another record for the same (file, function, scanner) group into
    /// this one: counts sum, line numbers union, distinct descriptions append,
    /// severity and confidence keep the maximum rank.
    pub fn merge(&mut self, other: &VulnerabilityRecord) {
        self.finding_count += other.finding_count;
        self.finding_lines.extend(other.finding_lines.iter().copied());
        self.line_start = self.line_start.min(other.line_start);
        self.line_end = self.line_end.max(other.line_end);
        self.severity = self.severity.max(other.severity);
        self.confidence = self.confidence.max(other.confidence);
        for desc in &other.descriptions {
            if !self.descriptions.contains(desc) {
                self.descriptions.push(desc.clone());
            }
        }
        if self.function_span.is_none() {
            self.function_span = other.function_span;
        }
    }

    /// All descriptions joined for table output
    pub fn description(&self) -> String {
        self.descriptions.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(line: u32, sev: Severity, conf: Confidence, desc: &str) -> VulnerabilityRecord {
        VulnerabilityRecord::finding(
            WeaknessClass::new("078"),
            "a.py",
            line,
            "bandit",
            sev,
            conf,
            desc,
        )
    }

    #[test]
    fn merge_sums_counts_and_unions_lines() {
        let mut a = rec(10, Severity::Low, Confidence::Low, "shell=True");
        a.merge(&rec(4, Severity::High, Confidence::Medium, "os.system"));
        a.merge(&rec(10, Severity::Medium, Confidence::High, "shell=True"));

        assert_eq!(a.finding_count, 3);
        assert_eq!(a.finding_lines.iter().copied().collect::<Vec<_>>(), [4, 10]);
        assert_eq!(a.severity, Severity::High);
        assert_eq!(a.confidence, Confidence::High);
        assert_eq!(a.description(), "shell=True; os.system");
        assert_eq!(a.line_start, 4);
        assert_eq!(a.line_end, 10);
    }

    #[test]
    fn failed_record_is_distinguishable_from_clean() {
        let failed =
            VulnerabilityRecord::failed(WeaknessClass::new("327"), "a.py", "bandit", "timeout");
        assert!(failed.is_failed());
        assert_eq!(failed.finding_count, 0);
        assert_eq!(failed.failure_reason.as_deref(), Some("timeout"));
    }
}
