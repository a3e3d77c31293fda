//! Function targets parsed from the round's instruction set
//!
//! Each line of the instruction set names one target: a relative file path and
//! one or more candidate function identifiers separated by `|`. Only the first
//! identifier is ever probed or scanned; extra identifiers are truncated at
//! parse time.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProbeError;

static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// A (file, function) pair selected from one descriptor line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionTarget {
    /// File path relative to the project root
    pub file: String,
    /// The probed function identifier (first identifier of the descriptor)
    pub function: String,
}

impl FunctionTarget {
    /// Parse a descriptor line of the form `path/to/file.py|function_name`.
    ///
    /// Trailing `()` on the identifier is tolerated. Descriptors carrying
    /// several identifiers (`file|a|b`) are truncated to the first one.
    pub fn parse(line: &str) -> Result<Self, ProbeError> {
        let malformed = || ProbeError::DescriptorParse {
            line: line.to_string(),
        };

        let mut parts = line.trim().split('|');
        let file = parts.next().map(str::trim).unwrap_or_default();
        let function = parts.next().map(str::trim).unwrap_or_default();

        if parts.next().is_some() {
            tracing::debug!(line, "descriptor has extra identifiers, keeping the first");
        }

        if file.is_empty() || function.is_empty() {
            return Err(malformed());
        }

        let function = function.trim_end_matches("()");
        if !IDENT_RE.is_match(function) {
            return Err(malformed());
        }

        Ok(Self {
            file: file.to_string(),
            function: function.to_string(),
        })
    }

    /// Stable key used in scan tables and the cross-round statistics table
    pub fn key(&self) -> FunctionKey {
        FunctionKey::new(&self.file, &self.function)
    }
}

impl fmt::Display for FunctionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.file, self.function)
    }
}

/// Identity of one probed function: `<file>_<function>()`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionKey(String);

impl FunctionKey {
    pub fn new(file: &str, function: &str) -> Self {
        Self(format!("{file}_{function}()"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FunctionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_descriptor() {
        let t = FunctionTarget::parse("aider/analytics.py|event").unwrap();
        assert_eq!(t.file, "aider/analytics.py");
        assert_eq!(t.function, "event");
        assert_eq!(t.key().as_str(), "aider/analytics.py_event()");
    }

    #[test]
    fn tolerates_call_parens() {
        let t = FunctionTarget::parse("src/a.py|run()").unwrap();
        assert_eq!(t.function, "run");
    }

    #[test]
    fn truncates_to_first_identifier() {
        let t = FunctionTarget::parse("src/a.py|first()|second()").unwrap();
        assert_eq!(t.function, "first");
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(FunctionTarget::parse("src/a.py event").is_err());
    }

    #[test]
    fn rejects_empty_fields() {
        assert!(FunctionTarget::parse("|event").is_err());
        assert!(FunctionTarget::parse("src/a.py|").is_err());
        assert!(FunctionTarget::parse("").is_err());
    }

    #[test]
    fn rejects_non_identifier_function() {
        assert!(FunctionTarget::parse("src/a.py|not a name").is_err());
    }
}
