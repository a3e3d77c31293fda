//! Run configuration
//!
//! One TOML file describes a whole run: which project and weakness class to
//! probe, how many rounds, the instruction templates, completion and retry
//! tuning, scanner setup, and the driver commands. Every field has a default
//! so a minimal config only names the project and the weakness class.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::completion::{CompletionDetector, RetryPolicy};
use crate::driver::DriverCommands;
use crate::orchestrator::{Pacing, PromptTemplates};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the project the assistant session is driven against
    pub project: PathBuf,

    /// Weakness class under probe, e.g. "CWE-078" or bare "078"
    pub weakness: String,

    /// Number of probing rounds
    #[serde(default = "default_rounds")]
    pub rounds: u32,

    /// File with one `file|function` descriptor per line
    #[serde(default = "default_targets_file")]
    pub targets_file: PathBuf,

    /// Root for every persisted artifact
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub templates: TemplatesConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub pacing: PacingConfig,

    #[serde(default)]
    pub scanners: ScannersConfig,

    /// Driver commands; required for `run`, unused by `scan` and `stats`
    #[serde(default)]
    pub driver: Option<DriverCommands>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    #[serde(default = "default_structure_template")]
    pub structure: String,
    #[serde(default = "default_implementation_template")]
    pub implementation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompletionConfig {
    /// Completion markers; empty means the built-in markers
    #[serde(default)]
    pub markers: Vec<String>,
    /// Boilerplate suffixes stripped before marker matching
    #[serde(default)]
    pub suffixes: Vec<String>,
    /// Upper bound in seconds on one wait for the session to go idle;
    /// absent means wait indefinitely
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Park this long before each resubmission
    #[serde(default = "default_retry_wait_secs")]
    pub wait_secs: u64,
    /// Progress log interval during the park
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,
    /// Retry ceiling; absent means retry until the response completes
    #[serde(default)]
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_after_open_secs")]
    pub after_open_secs: u64,
    #[serde(default = "default_between_targets_secs")]
    pub between_targets_secs: u64,
    #[serde(default = "default_between_phases_secs")]
    pub between_phases_secs: u64,
    #[serde(default = "default_between_rounds_secs")]
    pub between_rounds_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannersConfig {
    /// Scanners to run, in priority order (breaks equal-count ties)
    #[serde(default = "default_enabled_scanners")]
    pub enabled: Vec<String>,
    /// Hard timeout per scanner invocation
    #[serde(default = "default_scan_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_bandit_binary")]
    pub bandit_binary: String,
    #[serde(default = "default_semgrep_binary")]
    pub semgrep_binary: String,
    /// Directory holding per-weakness semgrep rule files (cwe-<id>.yaml)
    #[serde(default = "default_semgrep_rules_dir")]
    pub semgrep_rules_dir: PathBuf,
}

fn default_rounds() -> u32 {
    10
}

fn default_targets_file() -> PathBuf {
    PathBuf::from("targets.txt")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_structure_template() -> String {
    PromptTemplates::default().structure
}

fn default_implementation_template() -> String {
    PromptTemplates::default().implementation
}

fn default_retry_wait_secs() -> u64 {
    30 * 60
}

fn default_progress_interval_secs() -> u64 {
    60
}

fn default_after_open_secs() -> u64 {
    10
}

fn default_between_targets_secs() -> u64 {
    5
}

fn default_between_phases_secs() -> u64 {
    5
}

fn default_between_rounds_secs() -> u64 {
    10
}

fn default_enabled_scanners() -> Vec<String> {
    vec!["bandit".into(), "semgrep".into()]
}

fn default_scan_timeout_secs() -> u64 {
    300
}

fn default_bandit_binary() -> String {
    "bandit".into()
}

fn default_semgrep_binary() -> String {
    "semgrep".into()
}

fn default_semgrep_rules_dir() -> PathBuf {
    PathBuf::from("rules")
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            structure: default_structure_template(),
            implementation: default_implementation_template(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            wait_secs: default_retry_wait_secs(),
            progress_interval_secs: default_progress_interval_secs(),
            max_retries: None,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            after_open_secs: default_after_open_secs(),
            between_targets_secs: default_between_targets_secs(),
            between_phases_secs: default_between_phases_secs(),
            between_rounds_secs: default_between_rounds_secs(),
        }
    }
}

impl Default for ScannersConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_scanners(),
            timeout_secs: default_scan_timeout_secs(),
            bandit_binary: default_bandit_binary(),
            semgrep_binary: default_semgrep_binary(),
            semgrep_rules_dir: default_semgrep_rules_dir(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        crate::storage::write_atomic(path, content.as_bytes())
    }

    /// Project directory name, used to scope output paths
    pub fn project_name(&self) -> String {
        self.project
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    }

    pub fn templates(&self) -> PromptTemplates {
        PromptTemplates {
            structure: self.templates.structure.clone(),
            implementation: self.templates.implementation.clone(),
        }
    }

    pub fn detector(&self) -> CompletionDetector {
        CompletionDetector::new(
            self.completion.markers.clone(),
            self.completion.suffixes.clone(),
        )
    }

    pub fn completion_timeout(&self) -> Option<Duration> {
        self.completion.timeout_secs.map(Duration::from_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            wait: Duration::from_secs(self.retry.wait_secs),
            progress_interval: Duration::from_secs(self.retry.progress_interval_secs),
            max_retries: self.retry.max_retries,
        }
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            after_open: Duration::from_secs(self.pacing.after_open_secs),
            between_targets: Duration::from_secs(self.pacing.between_targets_secs),
            between_phases: Duration::from_secs(self.pacing.between_phases_secs),
            between_rounds: Duration::from_secs(self.pacing.between_rounds_secs),
        }
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scanners.timeout_secs)
    }
}
