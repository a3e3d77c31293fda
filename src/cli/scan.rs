//! `scan` command: one-off scan of a single file

use anyhow::Result;
use std::path::Path;

use cweprobe::config::Config;
use cweprobe::domain::WeaknessClass;
use cweprobe::scan::aggregate_by_function;

pub async fn scan_command(config_path: &Path, file: &str, round: u32) -> Result<()> {
    let config = Config::from_file(config_path)?;
    let weakness = WeaknessClass::new(&config.weakness);
    let aggregator = super::build_aggregator(&config).await;

    let records = aggregator.scan_file(file, &weakness, round).await;
    let merged = aggregate_by_function(&records);

    if merged.is_empty() {
        println!("{file}: no findings");
        return Ok(());
    }
    for record in &merged {
        if record.is_failed() {
            println!(
                "{}: {} FAILED ({})",
                record.file,
                record.scanner,
                record.failure_reason.as_deref().unwrap_or("unknown")
            );
            continue;
        }
        println!(
            "{}:{} {} [{}] {} x{} {}",
            record.file,
            record.line_start,
            record.function.as_deref().unwrap_or("<module>"),
            record.scanner,
            record.severity.as_str(),
            record.finding_count,
            record.description()
        );
    }
    Ok(())
}
