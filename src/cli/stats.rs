//! `stats` command: rebuild the statistics table from archived round tables

use anyhow::Result;
use std::path::Path;

use cweprobe::config::Config;
use cweprobe::stats::StatsTracker;

pub fn stats_command(config_path: &Path) -> Result<()> {
    let config = Config::from_file(config_path)?;
    let layout = super::layout_for(&config);

    let mut tracker = StatsTracker::initialize(
        layout.clone(),
        config.rounds,
        config.scanners.enabled.clone(),
        std::iter::empty(),
    )?;
    tracker.rebuild()?;

    print!("{}", tracker.table().to_csv());
    tracing::info!(table = %layout.stats_table_path().display(), "statistics table rebuilt");
    Ok(())
}
