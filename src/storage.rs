//! Durable output layout and atomic file replacement
//!
//! Everything a run persists lands under one output root:
//!
//! ```text
//! <out>/
//!   CWE-<id>/
//!     reports/<scanner>/<project>/round-<NN>/      raw native scanner reports
//!     rounds/<project>/round-<NN>_scan.json        function-level scan table
//!     query_statistics/<project>.csv               cross-round statistics table
//!   transcripts/<project>/round-<NN>/              one markdown file per (phase, target)
//! ```
//!
//! Tables are rewritten as whole files; `write_atomic` goes through a temp
//! file and a rename so an interrupted process never leaves a torn table.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::WeaknessClass;

/// Resolves every persisted path for one (project, weakness class) run
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
    project: String,
    weakness: WeaknessClass,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, project: impl Into<String>, weakness: WeaknessClass) -> Self {
        Self {
            root: root.into(),
            project: project.into(),
            weakness,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn weakness_dir(&self) -> PathBuf {
        self.root.join(self.weakness.to_string())
    }

    /// Directory for archived native reports of one scanner in one round
    pub fn report_dir(&self, scanner: &str, round: u32) -> PathBuf {
        self.weakness_dir()
            .join("reports")
            .join(scanner)
            .join(&self.project)
            .join(format!("round-{round:02}"))
    }

    /// Path of the function-level scan table for one round
    pub fn round_table_path(&self, round: u32) -> PathBuf {
        self.weakness_dir()
            .join("rounds")
            .join(&self.project)
            .join(format!("round-{round:02}_scan.json"))
    }

    /// Path of the cross-round statistics table
    pub fn stats_table_path(&self) -> PathBuf {
        self.weakness_dir()
            .join("query_statistics")
            .join(format!("{}.csv", self.project))
    }

    /// Directory holding transcripts for one round
    pub fn transcript_dir(&self, round: u32) -> PathBuf {
        self.root
            .join("transcripts")
            .join(&self.project)
            .join(format!("round-{round:02}"))
    }
}

/// Replace `path` with `contents` atomically (write to temp, then rename)
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
