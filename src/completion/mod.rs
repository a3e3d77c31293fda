//! Response completeness detection
//!
//! The assistant is instructed to end every answer with a fixed completion
//! marker. The captured text first has known assistant-appended boilerplate
//! suffixes stripped (several may stack), then trailing whitespace and common
//! punctuation, and is complete iff what remains ends with one of the markers.

mod retry;

pub use retry::{RetryDecision, RetryPolicy};

/// Fixed trailing phrases that signal the assistant considers itself done.
/// Localized variants are accepted.
const DEFAULT_MARKERS: &[&str] = &["已完成回答", "Response completed"];

/// Boilerplate the assistant appends after applying edits; stripped before
/// checking for a marker. Multiple copies may stack.
const DEFAULT_SUFFIXES: &[&str] = &["Made changes.", "Made changes"];

/// Whitespace and punctuation tolerated after the marker
const TRAILING_CHARS: &[char] = &[
    ' ', '\t', '\r', '\n', '"', '\'', '」', '』', '】', '》', '）', '〉', '>', '。', '、', '.',
    '!', '！', '?', '？', ';', '；', ':', '：', '…',
];

/// Decides whether a captured response is finished
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    markers: Vec<String>,
    suffixes: Vec<String>,
}

impl Default for CompletionDetector {
    fn default() -> Self {
        Self {
            markers: DEFAULT_MARKERS.iter().map(|s| s.to_string()).collect(),
            suffixes: DEFAULT_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CompletionDetector {
    pub fn new(markers: Vec<String>, suffixes: Vec<String>) -> Self {
        let mut detector = Self { markers, suffixes };
        if detector.markers.is_empty() {
            detector.markers = DEFAULT_MARKERS.iter().map(|s| s.to_string()).collect();
        }
        detector
    }

    /// True iff the response, after cleanup, ends with a completion marker
    pub fn is_complete(&self, raw: &str) -> bool {
        let cleaned = self.strip_suffixes(raw.trim());
        if cleaned.is_empty() {
            return false;
        }
        let normalized = cleaned.trim_end_matches(TRAILING_CHARS);
        self.markers.iter().any(|m| normalized.ends_with(m.as_str()))
    }

    /// Repeatedly remove known appended suffixes until none remains
    fn strip_suffixes<'a>(&self, raw: &'a str) -> &'a str {
        let mut cleaned = raw.trim_end();
        loop {
            let before = cleaned.len();
            for suffix in &self.suffixes {
                if let Some(rest) = cleaned.strip_suffix(suffix.as_str()) {
                    cleaned = rest.trim_end();
                    break;
                }
            }
            if cleaned.len() == before {
                return cleaned;
            }
        }
    }
}
