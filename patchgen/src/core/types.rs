//! Shared deterministic types for the patch pipeline.
//!
//! These types define stable contracts between the extractor, synthesizer,
//! validator and orchestrator. They carry no I/O handles and are rebuilt for
//! every invocation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Path marker used on the old side of a file creation.
pub const DEV_NULL: &str = "/dev/null";

/// Original ("before") file contents keyed by repository-relative path.
pub type FileContentMap = BTreeMap<String, String>;

/// How the LLM was asked to answer, chosen once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineMode {
    /// LLM emits full replacement files; the diff is computed mechanically.
    #[default]
    TwoStep,
    /// LLM emits a unified diff directly; it is only validated.
    Direct,
}

impl PipelineMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineMode::TwoStep => "two-step",
            PipelineMode::Direct => "direct",
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replacement file contents produced by the LLM, in response order.
///
/// Inserting a path twice replaces the earlier content but keeps its
/// position, so iteration order stays the order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifiedFileMap {
    entries: Vec<(String, String)>,
}

impl ModifiedFileMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `path`, returning the previous content if any.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) -> Option<String> {
        let path = path.into();
        let content = content.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == path) {
            Some((_, slot)) => Some(std::mem::replace(slot, content)),
            None => {
                self.entries.push((path, content));
                None
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == path)
            .map(|(_, content)| content.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_str()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ModifiedFileMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ModifiedFileMap::new();
        for (path, content) in iter {
            map.insert(path, content);
        }
        map
    }
}

/// Marker of a single hunk body line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Context,
    Add,
    Remove,
}

impl LineKind {
    pub fn marker(self) -> char {
        match self {
            LineKind::Context => ' ',
            LineKind::Add => '+',
            LineKind::Remove => '-',
        }
    }

    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            ' ' => Some(LineKind::Context),
            '+' => Some(LineKind::Add),
            '-' => Some(LineKind::Remove),
            _ => None,
        }
    }

    pub fn is_change(self) -> bool {
        !matches!(self, LineKind::Context)
    }
}

/// One body line of a hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkLine {
    pub kind: LineKind,
    pub text: String,
    /// Followed by a `\ No newline at end of file` marker.
    pub missing_newline: bool,
}

impl HunkLine {
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            missing_newline: false,
        }
    }

    pub fn context(text: impl Into<String>) -> Self {
        Self::new(LineKind::Context, text)
    }

    pub fn add(text: impl Into<String>) -> Self {
        Self::new(LineKind::Add, text)
    }

    pub fn remove(text: impl Into<String>) -> Self {
        Self::new(LineKind::Remove, text)
    }
}

/// Per-category line tally of a hunk body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCounts {
    pub context: usize,
    pub removed: usize,
    pub added: usize,
}

impl LineCounts {
    pub fn record(&mut self, kind: LineKind) {
        match kind {
            LineKind::Context => self.context += 1,
            LineKind::Remove => self.removed += 1,
            LineKind::Add => self.added += 1,
        }
    }

    /// Lines the hunk covers in the original file.
    pub fn old_side(&self) -> usize {
        self.context + self.removed
    }

    /// Lines the hunk covers in the new file.
    pub fn new_side(&self) -> usize {
        self.context + self.added
    }
}

impl fmt::Display for LineCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "context={}, removed={}, added={}",
            self.context, self.removed, self.added
        )
    }
}

/// A contiguous change region of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchHunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    /// Optional section heading git prints after the closing `@@`.
    pub heading: String,
    pub lines: Vec<HunkLine>,
}

impl PatchHunk {
    pub fn line_counts(&self) -> LineCounts {
        let mut counts = LineCounts::default();
        for line in &self.lines {
            counts.record(line.kind);
        }
        counts
    }

    /// True when the header counts agree with the body.
    pub fn is_balanced(&self) -> bool {
        let counts = self.line_counts();
        counts.old_side() == self.old_count && counts.new_side() == self.new_count
    }

    /// `@@ -0,0 +n,m @@`: the hunk creates the file.
    pub fn creates_file(&self) -> bool {
        self.old_start == 0 && self.old_count == 0
    }

    /// Canonical header line, omitting counts equal to one.
    pub fn header(&self) -> String {
        let mut header = format!(
            "@@ -{} +{} @@",
            format_range(self.old_start, self.old_count),
            format_range(self.new_start, self.new_count)
        );
        if !self.heading.is_empty() {
            header.push(' ');
            header.push_str(&self.heading);
        }
        header
    }

    fn render_into(&self, out: &mut String) {
        out.push_str(&self.header());
        out.push('\n');
        for line in &self.lines {
            out.push(line.kind.marker());
            out.push_str(&line.text);
            out.push('\n');
            if line.missing_newline {
                out.push_str("\\ No newline at end of file\n");
            }
        }
    }
}

fn format_range(start: usize, count: usize) -> String {
    if count == 1 {
        start.to_string()
    } else {
        format!("{start},{count}")
    }
}

/// All hunks touching one file.
///
/// Paths are repository-relative without the `a/` / `b/` prefixes; the old
/// side of a creation is [`DEV_NULL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub old_path: String,
    pub new_path: String,
    pub hunks: Vec<PatchHunk>,
}

impl FileDiff {
    pub fn is_creation(&self) -> bool {
        self.old_path == DEV_NULL
    }

    pub fn is_deletion(&self) -> bool {
        self.new_path == DEV_NULL
    }

    /// The repository path this diff applies to.
    pub fn path(&self) -> &str {
        if self.is_deletion() {
            &self.old_path
        } else {
            &self.new_path
        }
    }

    /// `(added, removed)` line totals.
    pub fn stats(&self) -> (usize, usize) {
        self.hunks.iter().fold((0, 0), |(added, removed), hunk| {
            let counts = hunk.line_counts();
            (added + counts.added, removed + counts.removed)
        })
    }

    fn render_into(&self, out: &mut String) {
        let path = self.path();
        out.push_str(&format!("diff --git a/{path} b/{path}\n"));
        if self.is_creation() {
            out.push_str("new file mode 100644\n");
        } else if self.is_deletion() {
            out.push_str("deleted file mode 100644\n");
        }
        out.push_str(&format!("--- {}\n", side_label(&self.old_path, "a/")));
        out.push_str(&format!("+++ {}\n", side_label(&self.new_path, "b/")));
        for hunk in &self.hunks {
            hunk.render_into(out);
        }
    }
}

fn side_label(path: &str, prefix: &str) -> String {
    if path == DEV_NULL {
        DEV_NULL.to_string()
    } else {
        format!("{prefix}{path}")
    }
}

/// Ordered sequence of file diffs; its text form is the unified-diff document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    pub files: Vec<FileDiff>,
}

impl Patch {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Unified-diff text: LF only, exactly one trailing newline when non-empty.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for file in &self.files {
            file.render_into(&mut out);
        }
        out
    }
}

/// One structural violation found in a candidate patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// 1-based hunk number, counted over every `@@` line of the document.
    pub hunk: Option<usize>,
    pub message: String,
}

impl ValidationError {
    pub fn document(message: impl Into<String>) -> Self {
        Self {
            hunk: None,
            message: message.into(),
        }
    }

    pub fn hunk(number: usize, message: impl Into<String>) -> Self {
        Self {
            hunk: Some(number),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
