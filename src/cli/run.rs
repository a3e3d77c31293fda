//! `run` command: execute the full probe

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

use cweprobe::completion::RetryPolicy;
use cweprobe::config::Config;
use cweprobe::context::RunContext;
use cweprobe::domain::WeaknessClass;
use cweprobe::driver::CommandDriver;
use cweprobe::orchestrator::{
    parse_targets, Orchestrator, OrchestratorOptions, RunOutcome, TranscriptWriter,
};
use cweprobe::stats::StatsTracker;

pub async fn run_command(config_path: &Path) -> Result<()> {
    let config = Config::from_file(config_path)?;
    let Some(driver_commands) = config.driver.clone() else {
        bail!("config has no [driver] section; `run` needs one");
    };

    let targets_text = std::fs::read_to_string(&config.targets_file)
        .with_context(|| format!("failed to read {}", config.targets_file.display()))?;
    let targets = parse_targets(&targets_text);
    if targets.is_empty() {
        bail!("no valid targets in {}", config.targets_file.display());
    }

    let layout = super::layout_for(&config);
    let aggregator = super::build_aggregator(&config).await;
    if aggregator.scanner_ids().is_empty() {
        bail!("no scanner is available for {}", config.weakness);
    }

    let tracker = StatsTracker::initialize(
        layout.clone(),
        config.rounds,
        aggregator.scanner_ids(),
        targets.iter().map(|(_, t)| t.key()),
    )?;

    let ctx = RunContext::new();
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing current step then stopping");
            cancel.cancel();
        }
    });

    let options = OrchestratorOptions {
        project: config.project.clone(),
        weakness: WeaknessClass::new(&config.weakness),
        rounds: config.rounds,
        templates: config.templates(),
        pacing: config.pacing(),
        completion_timeout: config.completion_timeout(),
    };
    let retry: RetryPolicy = config.retry_policy();
    let mut orchestrator = Orchestrator::new(
        options,
        Arc::new(CommandDriver::new(driver_commands)),
        aggregator,
        tracker,
        config.detector(),
        retry,
        TranscriptWriter::new(layout.clone()),
        ctx,
        targets,
    );

    match orchestrator.run().await? {
        RunOutcome::Done => {
            tracing::info!(table = %layout.stats_table_path().display(), "run finished");
        }
        RunOutcome::Aborted => {
            tracing::warn!(
                table = %layout.stats_table_path().display(),
                "run aborted; completed rounds remain valid"
            );
        }
    }
    Ok(())
}
