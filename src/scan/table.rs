//! Per-round function-level scan table
//!
//! One row per (function target, scanner) per round, written at the end of
//! every round so a partial run remains valid. The statistics tracker reads
//! these tables back to build the cross-round view.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Confidence, FunctionKey, FunctionTarget, ScanStatus, Severity, VulnerabilityRecord,
};
use crate::storage::{write_atomic, OutputLayout};

/// One scanner's verdict for one function target in one round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionScanRow {
    pub round: u32,
    /// 1-based line number of the target in the round's instruction set
    pub line: usize,
    pub function_key: FunctionKey,
    /// Enclosing-definition name when it differs from the probed identifier
    /// (the assistant renamed the function)
    pub resolved_name: Option<String>,
    pub function_span: Option<(u32, u32)>,
    pub finding_count: u32,
    pub finding_lines: Vec<u32>,
    pub scanner: String,
    pub confidence: Option<Confidence>,
    pub severity: Option<Severity>,
    pub description: String,
    pub status: ScanStatus,
    pub failure_reason: Option<String>,
}

impl FunctionScanRow {
    fn safe(round: u32, line: usize, key: FunctionKey, scanner: &str) -> Self {
        Self {
            round,
            line,
            function_key: key,
            resolved_name: None,
            function_span: None,
            finding_count: 0,
            finding_lines: Vec::new(),
            scanner: scanner.to_string(),
            confidence: None,
            severity: None,
            description: String::new(),
            status: ScanStatus::Success,
            failure_reason: None,
        }
    }

    pub fn failed(round: u32, line: usize, key: FunctionKey, scanner: &str, reason: String) -> Self {
        Self {
            status: ScanStatus::Failed,
            failure_reason: Some(reason),
            ..Self::safe(round, line, key, scanner)
        }
    }

    fn from_record(round: u32, line: usize, key: FunctionKey, record: &VulnerabilityRecord) -> Self {
        Self {
            round,
            line,
            function_key: key,
            resolved_name: None,
            function_span: record.function_span,
            finding_count: record.finding_count,
            finding_lines: record.finding_lines.iter().copied().collect(),
            scanner: record.scanner.clone(),
            confidence: Some(record.confidence),
            severity: Some(record.severity),
            description: record.description(),
            status: ScanStatus::Success,
            failure_reason: None,
        }
    }
}

/// Build the rows for one target from aggregated scan output.
///
/// Exactly one row per configured scanner: a failed row when that scanner's
/// invocation failed, a finding row when an aggregated record matches the
/// target function, otherwise a 0-finding row. A single foreign function name
/// resolved in the target file is treated as the target after a rename and
/// recorded as the before/after pair.
pub fn rows_for_target(
    round: u32,
    line: usize,
    target: &FunctionTarget,
    scanner_ids: &[String],
    aggregated: &[VulnerabilityRecord],
) -> Vec<FunctionScanRow> {
    let key = target.key();
    scanner_ids
        .iter()
        .map(|scanner| {
            let of_scanner: Vec<&VulnerabilityRecord> = aggregated
                .iter()
                .filter(|r| &r.scanner == scanner && r.file == target.file)
                .collect();

            if let Some(failed) = of_scanner.iter().find(|r| r.is_failed()) {
                return FunctionScanRow::failed(
                    round,
                    line,
                    key.clone(),
                    scanner,
                    failed
                        .failure_reason
                        .clone()
                        .unwrap_or_else(|| "unknown error".into()),
                );
            }

            // Exact match on the probed identifier first
            if let Some(hit) = of_scanner
                .iter()
                .find(|r| r.function.as_deref() == Some(target.function.as_str()))
            {
                return FunctionScanRow::from_record(round, line, key.clone(), hit);
            }

            // Rename case: all findings resolved to one other function name
            let mut names: Vec<&str> = of_scanner
                .iter()
                .filter_map(|r| r.function.as_deref())
                .collect();
            names.sort_unstable();
            names.dedup();
            if let [renamed] = names[..] {
                let hit = of_scanner
                    .iter()
                    .find(|r| r.function.as_deref() == Some(renamed))
                    .expect("name came from this list");
                let mut row = FunctionScanRow::from_record(round, line, key.clone(), hit);
                row.resolved_name = Some(renamed.to_string());
                return row;
            }

            FunctionScanRow::safe(round, line, key.clone(), scanner)
        })
        .collect()
}

/// All rows of one round, persisted as a whole file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoundScanTable {
    pub round: u32,
    pub rows: Vec<FunctionScanRow>,
}

impl RoundScanTable {
    pub fn new(round: u32) -> Self {
        Self {
            round,
            rows: Vec::new(),
        }
    }

    /// Atomically replace this round's table on disk
    pub fn save(&self, layout: &OutputLayout) -> Result<()> {
        let path = layout.round_table_path(self.round);
        let json = serde_json::to_vec_pretty(self).context("failed to serialize scan table")?;
        write_atomic(&path, &json)
    }

    /// Load a round's table; `Ok(None)` when the round was never scanned
    pub fn load(layout: &OutputLayout, round: u32) -> Result<Option<Self>> {
        let path = layout.round_table_path(round);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let table = serde_json::from_str(&text)
            .with_context(|| format!("malformed scan table {}", path.display()))?;
        Ok(Some(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WeaknessClass;

    fn target() -> FunctionTarget {
        FunctionTarget::parse("src/a.py|event").unwrap()
    }

    fn scanners() -> Vec<String> {
        vec!["bandit".into(), "semgrep".into()]
    }

    fn finding(function: Option<&str>, scanner: &str, count: u32) -> VulnerabilityRecord {
        let mut r = VulnerabilityRecord::finding(
            WeaknessClass::new("078"),
            "src/a.py",
            10,
            scanner,
            Severity::High,
            Confidence::High,
            "os.system",
        );
        r.function = function.map(str::to_string);
        r.finding_count = count;
        r
    }

    #[test]
    fn one_row_per_scanner_with_safe_default() {
        let rows = rows_for_target(1, 1, &target(), &scanners(), &[]);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.status == ScanStatus::Success));
        assert!(rows.iter().all(|r| r.finding_count == 0));
    }

    #[test]
    fn exact_function_match_wins() {
        let records = vec![finding(Some("event"), "bandit", 2)];
        let rows = rows_for_target(1, 1, &target(), &scanners(), &records);
        let bandit = rows.iter().find(|r| r.scanner == "bandit").unwrap();
        assert_eq!(bandit.finding_count, 2);
        assert!(bandit.resolved_name.is_none());
        let semgrep = rows.iter().find(|r| r.scanner == "semgrep").unwrap();
        assert_eq!(semgrep.finding_count, 0);
    }

    #[test]
    fn single_foreign_name_is_recorded_as_rename() {
        let records = vec![finding(Some("handle_event"), "bandit", 1)];
        let rows = rows_for_target(2, 1, &target(), &scanners(), &records);
        let bandit = rows.iter().find(|r| r.scanner == "bandit").unwrap();
        assert_eq!(bandit.finding_count, 1);
        assert_eq!(bandit.resolved_name.as_deref(), Some("handle_event"));
    }

    #[test]
    fn ambiguous_foreign_names_do_not_match() {
        let records = vec![
            finding(Some("foo"), "bandit", 1),
            finding(Some("bar"), "bandit", 1),
        ];
        let rows = rows_for_target(1, 1, &target(), &scanners(), &records);
        let bandit = rows.iter().find(|r| r.scanner == "bandit").unwrap();
        assert_eq!(bandit.finding_count, 0);
    }

    #[test]
    fn failed_scanner_yields_failed_row() {
        let records = vec![VulnerabilityRecord::failed(
            WeaknessClass::new("078"),
            "src/a.py",
            "semgrep",
            "timed out after 300s",
        )];
        let rows = rows_for_target(1, 1, &target(), &scanners(), &records);
        let semgrep = rows.iter().find(|r| r.scanner == "semgrep").unwrap();
        assert_eq!(semgrep.status, ScanStatus::Failed);
        assert_eq!(
            semgrep.failure_reason.as_deref(),
            Some("timed out after 300s")
        );
    }
}
