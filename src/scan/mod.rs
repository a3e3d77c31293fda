//! Vulnerability scan aggregation
//!
//! Runs every configured external scanner against a single file for one
//! weakness class, normalizes the native reports, and merges findings per
//! function. Scanner process errors, malformed reports and missing output are
//! all converted to failed-status records at this boundary; no error crosses
//! it, so callers can always distinguish "confirmed no vulnerability" from
//! "scan did not run".

mod bandit;
mod scanner;
mod semgrep;
mod span;
mod table;

pub use bandit::BanditScanner;
pub use scanner::{probe_available, run_scanner, ExternalScanner, RawReport};
pub use semgrep::SemgrepScanner;
pub use span::{resolve_span, FunctionSpan};
pub use table::{rows_for_target, FunctionScanRow, RoundScanTable};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{VulnerabilityRecord, WeaknessClass};
use crate::storage::OutputLayout;

/// Runs configured scanners against single files and merges their findings
pub struct ScanAggregator {
    project_root: PathBuf,
    scanners: Vec<Arc<dyn ExternalScanner>>,
    timeout: Duration,
    layout: Option<OutputLayout>,
}

impl ScanAggregator {
    pub fn new(
        project_root: impl Into<PathBuf>,
        scanners: Vec<Arc<dyn ExternalScanner>>,
        timeout: Duration,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            scanners,
            timeout,
            layout: None,
        }
    }

    /// Archive raw native reports under the run's output layout
    pub fn with_archive(mut self, layout: OutputLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Drop scanners whose binary is missing or that carry no rule set for
    /// the weakness class; logs what remains.
    pub async fn retain_available(&mut self, weakness: &WeaknessClass) {
        let mut kept = Vec::new();
        for scanner in self.scanners.drain(..) {
            if !scanner.supports(weakness) {
                tracing::warn!(scanner = scanner.id(), %weakness, "no rule set, excluding");
                continue;
            }
            if !probe_available(scanner.binary()).await {
                tracing::warn!(
                    scanner = scanner.id(),
                    binary = scanner.binary(),
                    "scanner not available, excluding"
                );
                continue;
            }
            kept.push(scanner);
        }
        tracing::info!(
            scanners = ?kept.iter().map(|s| s.id()).collect::<Vec<_>>(),
            "available scanners"
        );
        self.scanners = kept;
    }

    /// Ids of the configured scanners, in configured order
    pub fn scanner_ids(&self) -> Vec<String> {
        self.scanners.iter().map(|s| s.id().to_string()).collect()
    }

    /// Scan one project-relative file for the weakness class with every
    /// configured scanner.
    ///
    /// Never fails: each scanner either contributes its findings (possibly
    /// none) or exactly one failed-status record explaining why it did not
    /// run.
    pub async fn scan_file(
        &self,
        rel_path: &str,
        weakness: &WeaknessClass,
        round: u32,
    ) -> Vec<VulnerabilityRecord> {
        let full_path = self.project_root.join(rel_path);
        let source = match std::fs::read_to_string(&full_path) {
            Ok(source) => Some(source),
            Err(err) => {
                tracing::warn!(file = rel_path, %err, "cannot read scan target");
                None
            }
        };

        let mut records = Vec::new();
        for scanner in &self.scanners {
            if source.is_none() {
                records.push(VulnerabilityRecord::failed(
                    weakness.clone(),
                    rel_path,
                    scanner.id(),
                    format!("file not found: {}", full_path.display()),
                ));
                continue;
            }

            let report = match run_scanner(scanner.as_ref(), &full_path, weakness, self.timeout)
                .await
            {
                Ok(report) => report,
                Err(err) => {
                    tracing::error!(scanner = scanner.id(), file = rel_path, %err, "scan failed");
                    records.push(VulnerabilityRecord::failed(
                        weakness.clone(),
                        rel_path,
                        scanner.id(),
                        err.to_string(),
                    ));
                    continue;
                }
            };

            self.archive_report(scanner.id(), rel_path, round, &report);

            match scanner.parse(&report, rel_path, weakness) {
                Ok(mut parsed) => {
                    if let Some(source) = &source {
                        for record in &mut parsed {
                            if let Some(span) = resolve_span(source, record.line_start) {
                                record.function = Some(span.name);
                                record.function_span = Some((span.start, span.end));
                            }
                        }
                    }
                    tracing::debug!(
                        scanner = scanner.id(),
                        file = rel_path,
                        findings = parsed.len(),
                        "scan complete"
                    );
                    records.extend(parsed);
                }
                Err(err) => {
                    tracing::error!(scanner = scanner.id(), file = rel_path, %err, "bad report");
                    records.push(VulnerabilityRecord::failed(
                        weakness.clone(),
                        rel_path,
                        scanner.id(),
                        err.to_string(),
                    ));
                }
            }
        }
        records
    }

    fn archive_report(&self, scanner: &str, rel_path: &str, round: u32, report: &RawReport) {
        let Some(layout) = &self.layout else {
            return;
        };
        let dir = layout.report_dir(scanner, round);
        let stem = rel_path.replace(['/', '\\'], "_");
        let path = dir.join(format!("{stem}.json"));
        if let Err(err) = std::fs::create_dir_all(&dir)
            .and_then(|_| std::fs::write(&path, report.body.as_bytes()))
        {
            tracing::warn!(%err, path = %path.display(), "failed to archive raw report");
        }
    }
}

/// Merge raw findings by (file, function, scanner).
///
/// Records without a resolvable function (and failed records) stay ungrouped,
/// each keyed by its own identity, so distinct unresolved findings never merge
/// by accident. The result is sorted, which makes aggregation idempotent and
/// independent of input order.
pub fn aggregate_by_function(records: &[VulnerabilityRecord]) -> Vec<VulnerabilityRecord> {
    let mut grouped: HashMap<(String, String, String), VulnerabilityRecord> = HashMap::new();
    let mut ungrouped: Vec<VulnerabilityRecord> = Vec::new();

    for record in records {
        let Some(function) = record.function.clone().filter(|_| !record.is_failed()) else {
            ungrouped.push(record.clone());
            continue;
        };
        let key = (record.file.clone(), function, record.scanner.clone());
        match grouped.entry(key) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                entry.get_mut().merge(record);
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(record.clone());
            }
        }
    }

    let mut merged: Vec<VulnerabilityRecord> = grouped.into_values().collect();
    merged.extend(ungrouped);
    merged.sort_by(|a, b| {
        (&a.file, &a.function, &a.scanner, a.line_start)
            .cmp(&(&b.file, &b.function, &b.scanner, b.line_start))
    });
    merged
}
