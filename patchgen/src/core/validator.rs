//! Structural validation of candidate unified diffs.
//!
//! The validator is lenient: it never stops at the first problem and never
//! fails. It walks the document once, collects every violation and reports
//! them in a fixed order (file headers, hunk headers, per-hunk body checks,
//! marker presence) so that validating the same text twice yields the same
//! list.

use serde::Serialize;

use crate::core::normalize::normalize_line_endings;
use crate::core::types::{DEV_NULL, LineCounts, LineKind, ValidationError};
use crate::core::unified::{
    HunkHeader, header_path, is_header_pair, is_new_header, is_old_header, parse_hunk_header,
};

pub const EMPTY_PATCH: &str = "Patch is empty";
const COUNT_MISMATCH: &str = "line count mismatch";

/// Summary of one well-formed hunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HunkSummary {
    /// 1-based position among every `@@` line of the document.
    pub number: usize,
    /// Path of the enclosing file section, if the hunk follows a header pair.
    pub path: Option<String>,
    pub old_path: Option<String>,
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub counts: LineCounts,
    pub creates_file: bool,
}

impl HunkSummary {
    /// True when the hunk or its file section declares a new file.
    pub fn declares_creation(&self) -> bool {
        self.creates_file || self.old_path.as_deref() == Some(DEV_NULL)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub hunks: Vec<HunkSummary>,
}

impl ValidationReport {
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|err| err.message.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validator {
    /// Require a context line before and after the changes of each hunk.
    pub require_context_padding: bool,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            require_context_padding: true,
        }
    }
}

#[derive(Debug, Default)]
struct Scan {
    header_pairs: usize,
    stray_old: usize,
    stray_new: usize,
    marker_lines: usize,
    hunk_header_errors: Vec<ValidationError>,
    hunk_errors: Vec<ValidationError>,
    hunks: Vec<HunkSummary>,
}

#[derive(Debug, Clone)]
struct Section {
    old_path: String,
    new_path: String,
}

impl Section {
    fn path(&self) -> &str {
        if self.new_path == DEV_NULL {
            &self.old_path
        } else {
            &self.new_path
        }
    }
}

impl Validator {
    pub fn new(require_context_padding: bool) -> Self {
        Self {
            require_context_padding,
        }
    }

    pub fn validate(&self, text: &str) -> ValidationReport {
        let text = normalize_line_endings(text);
        if text.trim().is_empty() {
            return ValidationReport {
                errors: vec![ValidationError::document(EMPTY_PATCH)],
                hunks: Vec::new(),
            };
        }

        let lines: Vec<&str> = text.lines().collect();
        let scan = self.scan(&lines);

        let mut errors = Vec::new();
        if scan.header_pairs == 0 {
            if scan.stray_old == 0 && scan.stray_new == 0 {
                errors.push(ValidationError::document(
                    "Missing file headers: expected a '--- ' line followed by a '+++ ' line",
                ));
            } else {
                errors.push(ValidationError::document(format!(
                    "Unbalanced file headers: found {} '--- ' and {} '+++ ' line(s) but no '--- ' line is immediately followed by a '+++ ' line",
                    scan.stray_old, scan.stray_new
                )));
            }
        }

        errors.extend(scan.hunk_header_errors);
        if scan.hunks.is_empty() {
            errors.push(ValidationError::document(
                "No valid hunk header found (expected @@ -<start>[,<count>] +<start>[,<count>] @@)",
            ));
        }

        errors.extend(scan.hunk_errors);

        if scan.marker_lines == 0 {
            errors.push(ValidationError::document(
                "No line starts with a diff marker (' ', '+' or '-')",
            ));
        }

        ValidationReport {
            errors,
            hunks: scan.hunks,
        }
    }

    fn scan(&self, lines: &[&str]) -> Scan {
        let mut scan = Scan::default();
        let mut section: Option<Section> = None;
        let mut hunk_number = 0;
        let mut index = 0;

        while index < lines.len() {
            let line = lines[index];

            if is_header_pair(lines, index) {
                scan.header_pairs += 1;
                section = Some(Section {
                    old_path: header_path(line),
                    new_path: header_path(lines[index + 1]),
                });
                index += 2;
                continue;
            }

            if line.starts_with("@@") {
                hunk_number += 1;
                let header = parse_hunk_header(line);
                let end = body_end(lines, index + 1, header.as_ref());
                let body = trim_trailing_empty(&lines[index + 1..end]);
                scan.marker_lines += body.iter().filter(|line| has_marker(line)).count();

                match header {
                    Some(header) => {
                        self.check_hunk(
                            &mut scan,
                            hunk_number,
                            index + 1,
                            &header,
                            body,
                            section.as_ref(),
                        );
                    }
                    None => scan.hunk_header_errors.push(ValidationError::hunk(
                        hunk_number,
                        format!(
                            "Hunk {hunk_number}: malformed hunk header on line {}: {line}",
                            index + 1
                        ),
                    )),
                }
                index = end;
                continue;
            }

            if is_old_header(line) {
                scan.stray_old += 1;
            } else if is_new_header(line) {
                scan.stray_new += 1;
            } else if has_marker(line) {
                scan.marker_lines += 1;
            }
            index += 1;
        }

        scan
    }

    fn check_hunk(
        &self,
        scan: &mut Scan,
        number: usize,
        header_line: usize,
        header: &HunkHeader,
        body: &[&str],
        section: Option<&Section>,
    ) {
        let mut counts = LineCounts::default();
        let mut kinds = Vec::with_capacity(body.len());

        for (offset, line) in body.iter().enumerate() {
            let kind = match line.chars().next() {
                None => Some(LineKind::Context),
                Some('\\') => continue,
                Some(marker) => LineKind::from_marker(marker),
            };
            match kind {
                Some(kind) => {
                    counts.record(kind);
                    kinds.push(kind);
                }
                None => scan.hunk_errors.push(ValidationError::hunk(
                    number,
                    format!(
                        "Hunk {number}: unexpected line {} in hunk body: {line:?}",
                        header_line + offset + 1
                    ),
                )),
            }
        }

        scan.hunk_errors
            .extend(count_errors(number, header.old_count, header.new_count, counts));

        let whole_file = header.old_count == 0 || header.new_count == 0;
        if self.require_context_padding && !whole_file {
            if header.old_start > 1 && kinds.first().is_some_and(|kind| kind.is_change()) {
                scan.hunk_errors.push(ValidationError::hunk(
                    number,
                    format!("Hunk {number}: starts with a change line; expected leading context"),
                ));
            }
            if kinds.last().is_some_and(|kind| kind.is_change()) {
                scan.hunk_errors.push(ValidationError::hunk(
                    number,
                    format!("Hunk {number}: ends with a change line; expected trailing context"),
                ));
            }
        }

        scan.hunks.push(HunkSummary {
            number,
            path: section.map(|section| section.path().to_string()),
            old_path: section.map(|section| section.old_path.clone()),
            old_start: header.old_start,
            old_count: header.old_count,
            new_start: header.new_start,
            new_count: header.new_count,
            counts,
            creates_file: header.old_start == 0 && header.old_count == 0,
        });
    }
}

/// Count-mismatch errors for one hunk, one per mismatching side.
pub fn count_errors(
    number: usize,
    old_count: usize,
    new_count: usize,
    counts: LineCounts,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if counts.old_side() != old_count {
        errors.push(ValidationError::hunk(
            number,
            format!(
                "Hunk {number}: old line count mismatch: header says {old_count}, body has {} ({counts})",
                counts.old_side()
            ),
        ));
    }
    if counts.new_side() != new_count {
        errors.push(ValidationError::hunk(
            number,
            format!(
                "Hunk {number}: new line count mismatch: header says {new_count}, body has {} ({counts})",
                counts.new_side()
            ),
        ));
    }
    errors
}

/// Count self-test over rendered patch text.
///
/// The text is parsed back with the lenient validator and only header/body
/// count mismatches are kept. An empty render yields nothing.
pub fn check_rendered_counts(text: &str) -> Vec<ValidationError> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    Validator::new(false)
        .validate(text)
        .errors
        .into_iter()
        .filter(|err| err.hunk.is_some() && err.message.contains(COUNT_MISMATCH))
        .collect()
}

fn has_marker(line: &str) -> bool {
    matches!(line.chars().next(), Some(' ' | '+' | '-'))
}

/// Index one past the last body line of the hunk starting at `start`.
///
/// A header pair ends the body once the declared counts are satisfied or when
/// it is directly followed by a hunk header, so a removed `-- x` line next to
/// an added `++ y` line is not mistaken for a new file section.
fn body_end(lines: &[&str], start: usize, header: Option<&HunkHeader>) -> usize {
    let mut counts = LineCounts::default();
    let mut index = start;
    while index < lines.len() {
        let line = lines[index];
        if line.starts_with("@@") || line.starts_with("diff ") {
            break;
        }
        if is_header_pair(lines, index) {
            let satisfied = header.is_none_or(|header| {
                counts.old_side() >= header.old_count && counts.new_side() >= header.new_count
            });
            let opens_section = lines
                .get(index + 2)
                .is_some_and(|next| next.starts_with("@@"));
            if satisfied || opens_section {
                break;
            }
        }
        match line.chars().next() {
            None => counts.record(LineKind::Context),
            Some(marker) => {
                if let Some(kind) = LineKind::from_marker(marker) {
                    counts.record(kind);
                }
            }
        }
        index += 1;
    }
    index
}

fn trim_trailing_empty<'a, 'b>(body: &'b [&'a str]) -> &'b [&'a str] {
    let mut end = body.len();
    while end > 0 && body[end - 1].is_empty() {
        end -= 1;
    }
    &body[..end]
}
