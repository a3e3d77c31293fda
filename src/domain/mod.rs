//! Core data model shared by the scan aggregator, statistics tracker and
//! orchestrator.

mod record;
mod target;

pub use record::{ScanStatus, VulnerabilityRecord};
pub use target::{FunctionKey, FunctionTarget};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A CWE weakness class, stored as the bare numeric id (e.g. "327" or "022")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeaknessClass(pub String);

impl WeaknessClass {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self(id.trim_start_matches("CWE-").to_string())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WeaknessClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CWE-{}", self.0)
    }
}

/// Finding severity, ordered so that `max` picks the highest rank
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" | "INFORMATIONAL" => Ok(Self::Info),
            "LOW" | "WARNING" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" | "ERROR" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Finding confidence, ordered so that `max` picks the highest rank
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    #[default]
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            other => Err(format!("unknown confidence: {other}")),
        }
    }
}

/// The two phases of a probing round.
///
/// `ElicitStructure` asks the assistant to restructure the target and keeps
/// the edits; `ElicitImplementation` asks for an implementation, scans the
/// result, and reverts the edits afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    ElicitStructure,
    ElicitImplementation,
}

impl Phase {
    /// Phase order within a round
    pub const ALL: [Phase; 2] = [Phase::ElicitStructure, Phase::ElicitImplementation];

    /// 1-based index used in transcripts and logs
    pub fn index(&self) -> usize {
        match self {
            Self::ElicitStructure => 1,
            Self::ElicitImplementation => 2,
        }
    }

    /// What happens to the assistant's edits once the phase completes
    pub fn edit_action(&self) -> EditAction {
        match self {
            Self::ElicitStructure => EditAction::Keep,
            Self::ElicitImplementation => EditAction::Revert,
        }
    }

    /// Whether the current file state is scanned at the end of this phase
    pub fn scans(&self) -> bool {
        matches!(self, Self::ElicitImplementation)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ElicitStructure => "structure",
            Self::ElicitImplementation => "implementation",
        }
    }
}

/// Keep or discard the assistant's pending edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    Keep,
    Revert,
}

impl EditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Revert => "revert",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_rank_order() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::Info);
    }

    #[test]
    fn confidence_rank_order() {
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
    }

    #[test]
    fn severity_parses_scanner_spellings() {
        assert_eq!("ERROR".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!("warning".parse::<Severity>().unwrap(), Severity::Low);
    }

    #[test]
    fn weakness_class_display() {
        assert_eq!(WeaknessClass::new("327").to_string(), "CWE-327");
        assert_eq!(WeaknessClass::new("CWE-022").id(), "022");
    }

    #[test]
    fn phase_edit_policy() {
        assert_eq!(Phase::ElicitStructure.edit_action(), EditAction::Keep);
        assert_eq!(Phase::ElicitImplementation.edit_action(), EditAction::Revert);
        assert!(Phase::ElicitImplementation.scans());
        assert!(!Phase::ElicitStructure.scans());
    }
}
