//! Path-header rewriting for diff-engine output.
//!
//! Engines see temporary files, so their headers carry scratch paths. Only
//! lines in header position (before the first `@@` of each file section) are
//! rewritten; hunk bodies pass through untouched.

use crate::core::types::DEV_NULL;

/// A recognised header-position line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum HeaderLine {
    DiffGit,
    Old,
    New,
    Index,
    Mode,
}

fn classify(line: &str) -> Option<HeaderLine> {
    if line.starts_with("diff ") {
        Some(HeaderLine::DiffGit)
    } else if line.starts_with("--- ") {
        Some(HeaderLine::Old)
    } else if line.starts_with("+++ ") {
        Some(HeaderLine::New)
    } else if line.starts_with("index ") {
        Some(HeaderLine::Index)
    } else if line.starts_with("old mode ") || line.starts_with("new mode ") {
        Some(HeaderLine::Mode)
    } else {
        None
    }
}

/// Logical target of a rewrite.
#[derive(Debug, Clone, Copy)]
pub struct HeaderTarget<'a> {
    pub path: &'a str,
    pub creation: bool,
}

impl HeaderTarget<'_> {
    fn old_side(&self) -> String {
        if self.creation {
            DEV_NULL.to_string()
        } else {
            format!("a/{}", self.path)
        }
    }

    fn new_side(&self) -> String {
        format!("b/{}", self.path)
    }
}

/// Rewrite `---`, `+++` and `diff` header lines to the logical path and drop
/// `index` and mode lines. Output ends with a newline when non-empty.
pub fn rewrite_headers(raw: &str, target: HeaderTarget<'_>) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_header = true;

    for line in raw.lines() {
        if line.starts_with("@@") {
            in_header = false;
        } else if line.starts_with("diff ") {
            in_header = true;
        }

        let rewritten = if in_header {
            match classify(line) {
                Some(HeaderLine::DiffGit) => Some(format!(
                    "diff --git a/{} b/{}",
                    target.path, target.path
                )),
                Some(HeaderLine::Old) => Some(format!("--- {}", target.old_side())),
                Some(HeaderLine::New) => Some(format!("+++ {}", target.new_side())),
                Some(HeaderLine::Index | HeaderLine::Mode) => continue,
                None => None,
            }
        } else {
            None
        };

        match rewritten {
            Some(line) => out.push_str(&line),
            None => out.push_str(line),
        }
        out.push('\n');
    }

    out
}
