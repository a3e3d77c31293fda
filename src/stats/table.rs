//! Cross-round statistics table
//!
//! One row per function, one cell per round, plus a final disposition. The
//! table is rendered to CSV (`round1..roundN`, then `QueryTimes`) and
//! rewritten as a whole file after every round. Cell spellings are stable:
//! empty, `0`, `#` (skipped), `failed`, or `"<count> (<scanner>)"`.

use anyhow::{bail, Context, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::domain::FunctionKey;
use crate::storage::write_atomic;

/// Outcome of one round for one function
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoundCell {
    /// Round not reached yet
    #[default]
    Empty,
    /// Scan ran, zero findings
    Safe,
    /// A prior round already succeeded; no scan needed
    Skipped,
    /// Every scanner failed for this function in this round
    Failed,
    /// At least one scanner reported findings
    Vulnerable { count: u32, scanner: String },
}

impl RoundCell {
    pub fn is_vulnerable(&self) -> bool {
        matches!(self, Self::Vulnerable { .. })
    }
}

impl fmt::Display for RoundCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Safe => f.write_str("0"),
            Self::Skipped => f.write_str("#"),
            Self::Failed => f.write_str("failed"),
            Self::Vulnerable { count, scanner } => write!(f, "{count} ({scanner})"),
        }
    }
}

impl FromStr for RoundCell {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "" => Ok(Self::Empty),
            "0" => Ok(Self::Safe),
            "#" => Ok(Self::Skipped),
            "failed" => Ok(Self::Failed),
            _ => {
                let (count, scanner) = match s.split_once('(') {
                    Some((count, rest)) => (count.trim(), rest.trim_end_matches(')').trim()),
                    None => (s, ""),
                };
                let count: u32 = count
                    .trim()
                    .parse()
                    .with_context(|| format!("unrecognized cell: '{s}'"))?;
                Ok(Self::Vulnerable {
                    count,
                    scanner: scanner.to_string(),
                })
            }
        }
    }
}

/// Final per-function classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// First round whose scan reported findings
    Vulnerable(u32),
    /// Never vulnerable, with at least one successful clean scan
    AllSafe,
    /// Never vulnerable and never successfully scanned
    Inconclusive,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vulnerable(round) => write!(f, "{round}"),
            Self::AllSafe => f.write_str("All-Safe"),
            Self::Inconclusive => f.write_str("Inconclusive"),
        }
    }
}

impl FromStr for Disposition {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "All-Safe" => Ok(Self::AllSafe),
            "Inconclusive" => Ok(Self::Inconclusive),
            other => Ok(Self::Vulnerable(
                other
                    .parse()
                    .with_context(|| format!("unrecognized disposition: '{s}'"))?,
            )),
        }
    }
}

/// One function's row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRow {
    pub key: FunctionKey,
    pub cells: Vec<RoundCell>,
    pub disposition: Option<Disposition>,
}

impl StatsRow {
    fn new(key: FunctionKey, total_rounds: u32) -> Self {
        Self {
            key,
            cells: vec![RoundCell::Empty; total_rounds as usize],
            disposition: None,
        }
    }

    /// First round (1-based) whose cell is vulnerable
    pub fn first_success_round(&self) -> Option<u32> {
        self.cells
            .iter()
            .position(RoundCell::is_vulnerable)
            .map(|idx| (idx + 1) as u32)
    }
}

/// The whole table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsTable {
    pub total_rounds: u32,
    pub rows: Vec<StatsRow>,
}

impl StatsTable {
    pub fn new(total_rounds: u32, keys: impl IntoIterator<Item = FunctionKey>) -> Self {
        Self {
            total_rounds,
            rows: keys
                .into_iter()
                .map(|key| StatsRow::new(key, total_rounds))
                .collect(),
        }
    }

    pub fn row(&self, key: &FunctionKey) -> Option<&StatsRow> {
        self.rows.iter().find(|r| &r.key == key)
    }

    pub fn row_mut(&mut self, key: &FunctionKey) -> Option<&mut StatsRow> {
        self.rows.iter_mut().find(|r| &r.key == key)
    }

    /// Append a skeleton row for a function first seen mid-run
    pub fn ensure_row(&mut self, key: &FunctionKey) -> &mut StatsRow {
        if let Some(idx) = self.rows.iter().position(|r| &r.key == key) {
            return &mut self.rows[idx];
        }
        self.rows.push(StatsRow::new(key.clone(), self.total_rounds));
        self.rows.last_mut().expect("just pushed")
    }

    fn header(&self) -> String {
        let mut cols = vec!["file_function\\round".to_string()];
        cols.extend((1..=self.total_rounds).map(|r| format!("round{r}")));
        cols.push("QueryTimes".into());
        cols.join(",")
    }

    pub fn to_csv(&self) -> String {
        let mut out = self.header();
        out.push('\n');
        for row in &self.rows {
            let mut cols = vec![row.key.to_string()];
            cols.extend(row.cells.iter().map(RoundCell::to_string));
            cols.push(
                row.disposition
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
            );
            out.push_str(&cols.join(","));
            out.push('\n');
        }
        out
    }

    pub fn from_csv(text: &str, total_rounds: u32) -> Result<Self> {
        let mut lines = text.lines();
        let Some(_header) = lines.next() else {
            bail!("statistics table is empty");
        };
        let mut rows = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let cols: Vec<&str> = line.split(',').collect();
            if cols.len() != total_rounds as usize + 2 {
                bail!(
                    "row has {} columns, expected {}: '{line}'",
                    cols.len(),
                    total_rounds + 2
                );
            }
            let key = FunctionKey::from(cols[0].to_string());
            let cells = cols[1..=total_rounds as usize]
                .iter()
                .map(|c| c.parse())
                .collect::<Result<Vec<RoundCell>>>()?;
            let disposition = match cols[total_rounds as usize + 1].trim() {
                "" => None,
                d => Some(d.parse()?),
            };
            rows.push(StatsRow {
                key,
                cells,
                disposition,
            });
        }
        Ok(Self { total_rounds, rows })
    }

    /// Atomically replace the table on disk
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.to_csv().as_bytes())
    }

    pub fn load(path: &Path, total_rounds: u32) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Some(Self::from_csv(&text, total_rounds)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_spellings_round_trip() {
        for cell in [
            RoundCell::Empty,
            RoundCell::Safe,
            RoundCell::Skipped,
            RoundCell::Failed,
            RoundCell::Vulnerable {
                count: 2,
                scanner: "bandit".into(),
            },
        ] {
            let parsed: RoundCell = cell.to_string().parse().unwrap();
            assert_eq!(parsed, cell);
        }
    }

    #[test]
    fn disposition_spellings_round_trip() {
        for d in [
            Disposition::Vulnerable(3),
            Disposition::AllSafe,
            Disposition::Inconclusive,
        ] {
            let parsed: Disposition = d.to_string().parse().unwrap();
            assert_eq!(parsed, d);
        }
    }

    #[test]
    fn csv_round_trip() {
        let mut table = StatsTable::new(
            3,
            [
                FunctionKey::new("a.py", "f"),
                FunctionKey::new("b.py", "g"),
            ],
        );
        {
            let row = table.row_mut(&FunctionKey::new("a.py", "f")).unwrap();
            row.cells[0] = RoundCell::Safe;
            row.cells[1] = RoundCell::Vulnerable {
                count: 2,
                scanner: "semgrep".into(),
            };
            row.cells[2] = RoundCell::Skipped;
            row.disposition = Some(Disposition::Vulnerable(2));
        }
        let csv = table.to_csv();
        let parsed = StatsTable::from_csv(&csv, 3).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn malformed_row_is_an_error() {
        let text = "file_function\\round,round1,QueryTimes\nonly_one_column\n";
        assert!(StatsTable::from_csv(text, 1).is_err());
    }
}
