//! Bandit adapter
//!
//! Bandit is driven per-file with `-t <tests>` selecting the rule ids mapped
//! to the weakness class, and `-f json` for a structured report on stdout.

use serde::Deserialize;
use std::path::Path;

use super::scanner::{ExternalScanner, RawReport};
use crate::domain::{Confidence, Severity, VulnerabilityRecord, WeaknessClass};
use crate::error::ProbeError;

/// Bandit test ids per CWE
fn tests_for(weakness: &WeaknessClass) -> Option<&'static str> {
    Some(match weakness.id() {
        "022" => "B202",
        "078" => "B102,B601,B602,B603,B604,B605,B606,B607,B609",
        "079" => "B704",
        "095" => "B307,B506",
        "113" => "B201",
        "117" => "B608",
        "326" => "B505",
        "327" => "B324,B502,B503,B504",
        "329" => "B507",
        "347" => "B506",
        "377" => "B108",
        "502" => "B301,B302,B303,B304,B305,B306,B506",
        "643" => "B320",
        "760" => "B303",
        "918" => "B310,B411,B413",
        "943" => "B608",
        "1333" => "B110",
        _ => return None,
    })
}

#[derive(Debug, Default)]
pub struct BanditScanner {
    binary: String,
}

impl BanditScanner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[derive(Deserialize)]
struct BanditReport {
    #[serde(default)]
    results: Vec<BanditResult>,
    #[serde(default)]
    errors: Vec<BanditError>,
}

#[derive(Deserialize)]
struct BanditResult {
    #[serde(default)]
    line_number: u32,
    #[serde(default)]
    issue_severity: String,
    #[serde(default)]
    issue_confidence: String,
    #[serde(default)]
    issue_text: String,
}

#[derive(Deserialize)]
struct BanditError {
    #[serde(default)]
    reason: String,
}

impl ExternalScanner for BanditScanner {
    fn id(&self) -> &'static str {
        "bandit"
    }

    fn binary(&self) -> &str {
        if self.binary.is_empty() {
            "bandit"
        } else {
            &self.binary
        }
    }

    fn supports(&self, weakness: &WeaknessClass) -> bool {
        tests_for(weakness).is_some()
    }

    fn invocation(&self, file: &Path, weakness: &WeaknessClass) -> Option<Vec<String>> {
        let tests = tests_for(weakness)?;
        Some(vec![
            self.binary().to_string(),
            file.to_string_lossy().into_owned(),
            "-t".into(),
            tests.into(),
            "-f".into(),
            "json".into(),
        ])
    }

    fn parse(
        &self,
        report: &RawReport,
        file: &str,
        weakness: &WeaknessClass,
    ) -> Result<Vec<VulnerabilityRecord>, ProbeError> {
        let parsed: BanditReport =
            serde_json::from_str(&report.body).map_err(|err| ProbeError::ScannerParse {
                scanner: self.id().to_string(),
                reason: err.to_string(),
            })?;

        if let Some(first) = parsed.errors.first() {
            return Err(ProbeError::ScannerParse {
                scanner: self.id().to_string(),
                reason: format!("report carries errors: {}", first.reason),
            });
        }

        Ok(parsed
            .results
            .into_iter()
            .map(|r| {
                VulnerabilityRecord::finding(
                    weakness.clone(),
                    file,
                    r.line_number,
                    self.id(),
                    r.issue_severity.parse().unwrap_or(Severity::Medium),
                    r.issue_confidence.parse().unwrap_or(Confidence::Medium),
                    r.issue_text,
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bandit_report() {
        let body = r#"{
            "errors": [],
            "results": [
                {"filename": "a.py", "line_number": 12, "issue_severity": "HIGH",
                 "issue_confidence": "MEDIUM", "issue_text": "Use of weak MD5 hash",
                 "test_id": "B324"},
                {"filename": "a.py", "line_number": 30, "issue_severity": "LOW",
                 "issue_confidence": "HIGH", "issue_text": "Pickle usage",
                 "test_id": "B301"}
            ]
        }"#;
        let scanner = BanditScanner::default();
        let report = RawReport {
            body: body.into(),
            exit_code: 1,
        };
        let records = scanner
            .parse(&report, "a.py", &WeaknessClass::new("327"))
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].line_start, 12);
        assert_eq!(records[0].severity, Severity::High);
        assert_eq!(records[0].confidence, Confidence::Medium);
        assert_eq!(records[1].scanner, "bandit");
    }

    #[test]
    fn malformed_report_is_a_parse_error() {
        let scanner = BanditScanner::default();
        let report = RawReport {
            body: "not json".into(),
            exit_code: 0,
        };
        let err = scanner
            .parse(&report, "a.py", &WeaknessClass::new("327"))
            .unwrap_err();
        assert!(matches!(err, ProbeError::ScannerParse { .. }));
    }

    #[test]
    fn unsupported_class_has_no_invocation() {
        let scanner = BanditScanner::default();
        assert!(scanner
            .invocation(Path::new("a.py"), &WeaknessClass::new("999"))
            .is_none());
        assert!(scanner.supports(&WeaknessClass::new("078")));
    }
}
