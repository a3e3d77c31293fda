//! Transcript persistence
//!
//! One markdown file per (round, phase, target): a metadata header, the
//! submitted instruction, and the captured response. Written right after
//! capture so a partial run keeps its evidence.

use anyhow::Result;
use chrono::Utc;

use crate::domain::{FunctionTarget, Phase};
use crate::storage::{write_atomic, OutputLayout};

pub struct TranscriptWriter {
    layout: OutputLayout,
}

impl TranscriptWriter {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    /// Persist one exchange; returns nothing the caller needs, errors only on I/O
    #[allow(clippy::too_many_arguments)]
    pub fn write(
        &self,
        round: u32,
        phase: Phase,
        line: usize,
        target: &FunctionTarget,
        instruction: &str,
        output: &str,
        retries: u32,
        success: bool,
    ) -> Result<()> {
        let path = self
            .layout
            .transcript_dir(round)
            .join(format!("phase-{}_line-{line:03}.md", phase.index()));

        let status = if success { "success" } else { "failed" };
        let body = format!(
            "---\n\
             project: {project}\n\
             round: {round}\n\
             phase: {phase}\n\
             target: {target}\n\
             retries: {retries}\n\
             status: {status}\n\
             captured_at: {timestamp}\n\
             ---\n\n\
             ## Instruction\n\n{instruction}\n\n\
             ## Response\n\n{output}\n",
            project = self.layout.project(),
            phase = phase.label(),
            timestamp = Utc::now().to_rfc3339(),
        );
        write_atomic(&path, body.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WeaknessClass;
    use tempfile::tempdir;

    #[test]
    fn writes_header_and_sections() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path(), "proj", WeaknessClass::new("078"));
        let writer = TranscriptWriter::new(layout.clone());
        let target = FunctionTarget::parse("src/a.py|event").unwrap();

        writer
            .write(
                2,
                Phase::ElicitImplementation,
                7,
                &target,
                "implement it",
                "done\nResponse completed",
                1,
                true,
            )
            .unwrap();

        let path = layout.transcript_dir(2).join("phase-2_line-007.md");
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("project: proj"));
        assert!(text.contains("round: 2"));
        assert!(text.contains("phase: implementation"));
        assert!(text.contains("target: src/a.py|event"));
        assert!(text.contains("retries: 1"));
        assert!(text.contains("## Instruction"));
        assert!(text.contains("## Response"));
    }
}
