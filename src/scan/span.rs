//! Enclosing-function resolution by indentation
//!
//! Best-effort heuristic: from a 1-indexed finding line, walk upward to the
//! nearest definition whose indentation does not exceed any intervening
//! non-blank, non-comment line, then walk downward until indentation returns
//! to the definition's level. Multi-line signatures, decorators and
//! unconventional formatting can defeat it; callers must tolerate `None`.

use once_cell::sync::Lazy;
use regex::Regex;

static DEF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap());

/// A resolved enclosing function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpan {
    pub name: String,
    /// 1-indexed, inclusive
    pub start: u32,
    pub end: u32,
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn is_ignorable(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Resolve the innermost function enclosing `finding_line` (1-indexed)
pub fn resolve_span(source: &str, finding_line: u32) -> Option<FunctionSpan> {
    if finding_line == 0 {
        return None;
    }
    let lines: Vec<&str> = source.lines().collect();
    let idx = (finding_line as usize).checked_sub(1)?;
    if idx >= lines.len() {
        return None;
    }

    // Upward: the definition must not be indented deeper than anything
    // between it and the finding line.
    let mut min_indent = usize::MAX;
    let mut def_idx = None;
    for i in (0..=idx).rev() {
        let line = lines[i];
        if is_ignorable(line) {
            continue;
        }
        let indent = indent_width(line);
        if let Some(caps) = DEF_RE.captures(line) {
            if indent <= min_indent {
                def_idx = Some((i, indent, caps[2].to_string()));
                break;
            }
        }
        min_indent = min_indent.min(indent);
    }
    let (def_idx, def_indent, name) = def_idx?;

    // A definition *after* deeper context but above the finding only encloses
    // the finding if the finding itself sits inside its body.
    if def_idx < idx {
        let finding_indent = indent_width(lines[idx]);
        if !is_ignorable(lines[idx]) && finding_indent <= def_indent {
            return None;
        }
    }

    // Downward: the body ends just before indentation returns to the
    // definition's level (or at end of file).
    let mut end_idx = def_idx;
    for (i, line) in lines.iter().enumerate().skip(def_idx + 1) {
        if is_ignorable(line) {
            continue;
        }
        if indent_width(line) <= def_indent {
            break;
        }
        end_idx = i;
    }

    Some(FunctionSpan {
        name,
        start: (def_idx + 1) as u32,
        end: (end_idx + 1) as u32,
    })
}
