//! Cross-round statistics tracking
//!
//! Maintains one row per probed function with per-round outcome cells and a
//! final disposition, updated incrementally after every round so a run is
//! inspectable and resumable mid-flight. Once a function's first-success
//! round is recorded, every later round is authoritatively marked skipped:
//! this is the cost-avoidance guarantee the orchestrator relies on, not a
//! display choice.

mod table;

pub use table::{Disposition, RoundCell, StatsRow, StatsTable};

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::domain::{FunctionKey, ScanStatus};
use crate::scan::{FunctionScanRow, RoundScanTable};
use crate::storage::OutputLayout;

/// Tracks per-function outcomes across rounds and persists the table
pub struct StatsTracker {
    layout: OutputLayout,
    path: PathBuf,
    total_rounds: u32,
    /// Configured scanner order; breaks ties between equal finding counts
    scanner_order: Vec<String>,
    table: StatsTable,
}

impl StatsTracker {
    /// Create the row skeleton (or resume from an existing table on disk)
    pub fn initialize(
        layout: OutputLayout,
        total_rounds: u32,
        scanner_order: Vec<String>,
        functions: impl IntoIterator<Item = FunctionKey>,
    ) -> Result<Self> {
        let path = layout.stats_table_path();
        let mut table = match StatsTable::load(&path, total_rounds)? {
            Some(existing) => {
                tracing::info!(path = %path.display(), "resuming existing statistics table");
                existing
            }
            None => StatsTable::new(total_rounds, std::iter::empty()),
        };
        for key in functions {
            table.ensure_row(&key);
        }
        table.save(&path).context("failed to write statistics table")?;

        Ok(Self {
            layout,
            path,
            total_rounds,
            scanner_order,
            table,
        })
    }

    pub fn table(&self) -> &StatsTable {
        &self.table
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Whether any prior round already recorded findings for this function
    pub fn should_skip(&self, key: &FunctionKey) -> bool {
        self.table
            .row(key)
            .is_some_and(|row| row.first_success_round().is_some())
    }

    /// Merge one round's aggregated scan output into the table and rewrite it.
    ///
    /// Reads the round's persisted scan table; a missing table marks every
    /// unresolved function failed for that round.
    pub fn update_round(&mut self, round: u32) -> Result<()> {
        let scan = RoundScanTable::load(&self.layout, round)?;
        let rows = scan.map(|t| t.rows).unwrap_or_default();
        self.apply_round(round, &rows);
        self.table.save(&self.path)
    }

    /// Rebuild every round from the archived per-round scan tables
    pub fn rebuild(&mut self) -> Result<()> {
        for row in &mut self.table.rows {
            row.cells.fill(RoundCell::Empty);
            row.disposition = None;
        }
        for round in 1..=self.total_rounds {
            let scan = RoundScanTable::load(&self.layout, round)?;
            let rows = scan.map(|t| t.rows).unwrap_or_default();
            self.apply_round(round, &rows);
        }
        self.table.save(&self.path)
    }

    fn apply_round(&mut self, round: u32, rows: &[FunctionScanRow]) {
        if round == 0 || round > self.total_rounds {
            tracing::warn!(round, "round index out of range, ignoring");
            return;
        }
        let idx = (round - 1) as usize;

        // Per-function view of this round's per-scanner rows
        let mut by_function: HashMap<&FunctionKey, Vec<&FunctionScanRow>> = HashMap::new();
        for row in rows {
            by_function.entry(&row.function_key).or_default().push(row);
        }
        for key in by_function.keys() {
            self.table.ensure_row(key);
        }

        for row in &mut self.table.rows {
            // Cost avoidance: a prior success makes every later round skipped,
            // whether or not a scan actually ran.
            if row
                .first_success_round()
                .is_some_and(|success| success < round)
            {
                row.cells[idx] = RoundCell::Skipped;
                continue;
            }

            let scans = by_function.get(&row.key).map(Vec::as_slice).unwrap_or(&[]);
            row.cells[idx] = Self::cell_for(scans, &self.scanner_order);

            if row.cells[idx].is_vulnerable() && row.disposition.is_none() {
                row.disposition = Some(Disposition::Vulnerable(round));
            }

            if round == self.total_rounds && row.disposition.is_none() {
                let any_clean_scan = row.cells.iter().any(|c| *c == RoundCell::Safe);
                row.disposition = Some(if any_clean_scan {
                    Disposition::AllSafe
                } else {
                    Disposition::Inconclusive
                });
            }
        }
    }

    /// One round's cell from that round's per-scanner rows.
    ///
    /// Vulnerable if any scanner reported findings (highest count wins, ties
    /// go to the earlier configured scanner); failed only if every scanner
    /// failed; safe otherwise. No rows at all means the scan never ran.
    fn cell_for(scans: &[&FunctionScanRow], scanner_order: &[String]) -> RoundCell {
        if scans.is_empty() {
            return RoundCell::Failed;
        }

        let rank = |scanner: &str| {
            scanner_order
                .iter()
                .position(|s| s == scanner)
                .unwrap_or(usize::MAX)
        };
        let best = scans
            .iter()
            .filter(|s| s.status == ScanStatus::Success && s.finding_count > 0)
            .min_by_key(|s| (std::cmp::Reverse(s.finding_count), rank(&s.scanner)));
        if let Some(best) = best {
            return RoundCell::Vulnerable {
                count: best.finding_count,
                scanner: best.scanner.clone(),
            };
        }

        if scans.iter().all(|s| s.status == ScanStatus::Failed) {
            RoundCell::Failed
        } else {
            RoundCell::Safe
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WeaknessClass;
    use crate::scan::RoundScanTable;
    use tempfile::tempdir;

    fn scan_row(round: u32, key: &FunctionKey, scanner: &str, count: u32) -> FunctionScanRow {
        FunctionScanRow {
            round,
            line: 1,
            function_key: key.clone(),
            resolved_name: None,
            function_span: None,
            finding_count: count,
            finding_lines: Vec::new(),
            scanner: scanner.to_string(),
            confidence: None,
            severity: None,
            description: String::new(),
            status: ScanStatus::Success,
            failure_reason: None,
        }
    }

    fn failed_row(round: u32, key: &FunctionKey, scanner: &str) -> FunctionScanRow {
        FunctionScanRow {
            status: ScanStatus::Failed,
            failure_reason: Some("timeout".into()),
            ..scan_row(round, key, scanner, 0)
        }
    }

    fn tracker(dir: &std::path::Path, rounds: u32, keys: &[FunctionKey]) -> StatsTracker {
        let layout = OutputLayout::new(dir, "proj", WeaknessClass::new("078"));
        StatsTracker::initialize(
            layout,
            rounds,
            vec!["bandit".into(), "semgrep".into()],
            keys.iter().cloned(),
        )
        .unwrap()
    }

    fn write_round(dir: &std::path::Path, round: u32, rows: Vec<FunctionScanRow>) {
        let layout = OutputLayout::new(dir, "proj", WeaknessClass::new("078"));
        let table = RoundScanTable { round, rows };
        table.save(&layout).unwrap();
    }

    #[test]
    fn first_success_then_skipped_forever() {
        let dir = tempdir().unwrap();
        let key = FunctionKey::new("a.py", "f");
        let mut t = tracker(dir.path(), 4, &[key.clone()]);

        write_round(dir.path(), 1, vec![scan_row(1, &key, "bandit", 0)]);
        write_round(dir.path(), 2, vec![scan_row(2, &key, "bandit", 2)]);
        // Rounds 3 and 4 never scanned: skip must be authoritative anyway
        for round in 1..=4 {
            t.update_round(round).unwrap();
        }

        let row = t.table().row(&key).unwrap();
        assert_eq!(row.cells[0], RoundCell::Safe);
        assert_eq!(
            row.cells[1],
            RoundCell::Vulnerable {
                count: 2,
                scanner: "bandit".into()
            }
        );
        assert_eq!(row.cells[2], RoundCell::Skipped);
        assert_eq!(row.cells[3], RoundCell::Skipped);
        assert_eq!(row.disposition, Some(Disposition::Vulnerable(2)));
        assert!(t.should_skip(&key));
    }

    #[test]
    fn failed_then_safe_is_all_safe() {
        let dir = tempdir().unwrap();
        let key = FunctionKey::new("a.py", "f");
        let mut t = tracker(dir.path(), 2, &[key.clone()]);

        write_round(
            dir.path(),
            1,
            vec![failed_row(1, &key, "bandit"), failed_row(1, &key, "semgrep")],
        );
        write_round(dir.path(), 2, vec![scan_row(2, &key, "bandit", 0)]);
        t.update_round(1).unwrap();
        t.update_round(2).unwrap();

        let row = t.table().row(&key).unwrap();
        assert_eq!(row.cells[0], RoundCell::Failed);
        assert_eq!(row.cells[1], RoundCell::Safe);
        assert_eq!(row.disposition, Some(Disposition::AllSafe));
    }

    #[test]
    fn all_rounds_failed_is_inconclusive() {
        let dir = tempdir().unwrap();
        let key = FunctionKey::new("a.py", "f");
        let mut t = tracker(dir.path(), 2, &[key.clone()]);

        write_round(dir.path(), 1, vec![failed_row(1, &key, "bandit")]);
        // Round 2 table missing entirely
        t.update_round(1).unwrap();
        t.update_round(2).unwrap();

        let row = t.table().row(&key).unwrap();
        assert_eq!(row.cells[0], RoundCell::Failed);
        assert_eq!(row.cells[1], RoundCell::Failed);
        assert_eq!(row.disposition, Some(Disposition::Inconclusive));
    }

    #[test]
    fn any_scanner_with_findings_wins_the_round() {
        let dir = tempdir().unwrap();
        let key = FunctionKey::new("a.py", "f");
        let mut t = tracker(dir.path(), 1, &[key.clone()]);

        write_round(
            dir.path(),
            1,
            vec![
                scan_row(1, &key, "bandit", 0),
                scan_row(1, &key, "semgrep", 3),
            ],
        );
        t.update_round(1).unwrap();

        let row = t.table().row(&key).unwrap();
        assert_eq!(
            row.cells[0],
            RoundCell::Vulnerable {
                count: 3,
                scanner: "semgrep".into()
            }
        );
        assert_eq!(row.disposition, Some(Disposition::Vulnerable(1)));
    }

    #[test]
    fn equal_counts_prefer_configured_order() {
        let dir = tempdir().unwrap();
        let key = FunctionKey::new("a.py", "f");
        let mut t = tracker(dir.path(), 1, &[key.clone()]);

        write_round(
            dir.path(),
            1,
            vec![
                scan_row(1, &key, "semgrep", 2),
                scan_row(1, &key, "bandit", 2),
            ],
        );
        t.update_round(1).unwrap();

        let row = t.table().row(&key).unwrap();
        assert_eq!(
            row.cells[0],
            RoundCell::Vulnerable {
                count: 2,
                scanner: "bandit".into()
            }
        );
    }

    #[test]
    fn one_failed_one_clean_scanner_is_safe() {
        let dir = tempdir().unwrap();
        let key = FunctionKey::new("a.py", "f");
        let mut t = tracker(dir.path(), 1, &[key.clone()]);

        write_round(
            dir.path(),
            1,
            vec![failed_row(1, &key, "bandit"), scan_row(1, &key, "semgrep", 0)],
        );
        t.update_round(1).unwrap();

        let row = t.table().row(&key).unwrap();
        assert_eq!(row.cells[0], RoundCell::Safe);
        assert_eq!(row.disposition, Some(Disposition::AllSafe));
    }

    #[test]
    fn table_persists_and_resumes() {
        let dir = tempdir().unwrap();
        let key = FunctionKey::new("a.py", "f");
        {
            let mut t = tracker(dir.path(), 2, &[key.clone()]);
            write_round(dir.path(), 1, vec![scan_row(1, &key, "bandit", 1)]);
            t.update_round(1).unwrap();
        }
        // New tracker over the same output dir resumes the table
        let t = tracker(dir.path(), 2, &[key.clone()]);
        assert!(t.should_skip(&key));
        assert_eq!(
            t.table().row(&key).unwrap().disposition,
            Some(Disposition::Vulnerable(1))
        );
    }
}
