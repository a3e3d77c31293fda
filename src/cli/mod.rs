//! CLI command implementations

pub mod init;
pub mod run;
pub mod scan;
pub mod stats;

use std::sync::Arc;

use cweprobe::config::Config;
use cweprobe::domain::WeaknessClass;
use cweprobe::scan::{BanditScanner, ExternalScanner, ScanAggregator, SemgrepScanner};
use cweprobe::storage::OutputLayout;

/// Output layout derived from the config
pub(crate) fn layout_for(config: &Config) -> OutputLayout {
    OutputLayout::new(
        &config.output_dir,
        config.project_name(),
        WeaknessClass::new(&config.weakness),
    )
}

/// Build the configured scanners, in configured (priority) order
pub(crate) fn build_scanners(config: &Config) -> Vec<Arc<dyn ExternalScanner>> {
    config
        .scanners
        .enabled
        .iter()
        .filter_map(|name| -> Option<Arc<dyn ExternalScanner>> {
            match name.as_str() {
                "bandit" => Some(Arc::new(BanditScanner::new(&config.scanners.bandit_binary))),
                "semgrep" => Some(Arc::new(SemgrepScanner::new(
                    &config.scanners.semgrep_binary,
                    &config.scanners.semgrep_rules_dir,
                ))),
                other => {
                    tracing::warn!(scanner = other, "unknown scanner in config, ignoring");
                    None
                }
            }
        })
        .collect()
}

/// Aggregator over the configured project and scanners, archiving raw reports
pub(crate) async fn build_aggregator(config: &Config) -> ScanAggregator {
    let mut aggregator = ScanAggregator::new(
        &config.project,
        build_scanners(config),
        config.scan_timeout(),
    )
    .with_archive(layout_for(config));
    aggregator
        .retain_available(&WeaknessClass::new(&config.weakness))
        .await;
    aggregator
}
