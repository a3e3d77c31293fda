use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "cweprobe")]
#[command(about = "Probe an AI-assisted editor session for CWE susceptibility")]
#[command(version)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = "cweprobe.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full probe: all rounds, phases and targets
    Run,

    /// Scan one file once and print the aggregated findings
    Scan {
        /// Project-relative path of the file to scan
        file: String,

        /// Round number recorded in archived reports
        #[arg(long, default_value_t = 1)]
        round: u32,
    },

    /// Rebuild the cross-round statistics table from archived round tables
    Stats,

    /// Write a starter config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match cli.command {
        Commands::Run => cli::run::run_command(&cli.config).await?,
        Commands::Scan { file, round } => cli::scan::scan_command(&cli.config, &file, round).await?,
        Commands::Stats => cli::stats::stats_command(&cli.config)?,
        Commands::Init { force } => cli::init::init_command(&cli.config, force)?,
    }

    Ok(())
}
