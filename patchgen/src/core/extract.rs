//! Response extraction: LLM text to named files or a raw diff body.
//!
//! The extractor never touches the file system. It normalizes line endings,
//! picks the authoritative fenced block, truncates trailing tool noise and
//! either decodes `FILE:` blocks or hands back the diff text untouched.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::core::error::PatchError;
use crate::core::fence::{find_fences, is_fence_line};
use crate::core::normalize::{ensure_trailing_newline, normalize_line_endings};
use crate::core::types::{ModifiedFileMap, PipelineMode};

const FILE_MARKER: &str = "FILE:";
const BLOCK_END: &str = "---";

/// Line prefixes of shell, runtime and tool noise that models paste after the
/// real answer.
const DEFAULT_ARTIFACT_MARKERS: &[&str] = &[
    r"^(?:ba|z|k|da)?sh: ",
    r"^/(?:usr/)?bin/(?:ba|z)?sh: ",
    r"^(?:[\w./-]+: )+command not found",
    r"^Traceback \(most recent call last\):",
    r"^thread '[^']*' panicked at",
    r#"^Exception in thread ""#,
    r"^fatal: ",
    r"^error: (?:patch failed|corrupt patch|unrecognized input|No valid patches)",
    r"^\[(?:DEBUG|TRACE)\]",
    r"^(?:DEBUG|TRACE): ",
    r"^\[pj\] ",
    r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?Z?\s+\[?(?:TRACE|DEBUG|INFO|WARN|WARNING|ERROR)\]?\s",
];

static DEFAULT_ARTIFACT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DEFAULT_ARTIFACT_MARKERS
        .iter()
        .map(|pattern| Regex::new(pattern).unwrap())
        .collect()
});

static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+•]|\d+[.)])\s+\S").unwrap());

/// What the caller expects the response to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    FullFiles,
    Diff,
}

impl From<PipelineMode> for ExtractMode {
    fn from(mode: PipelineMode) -> Self {
        match mode {
            PipelineMode::TwoStep => ExtractMode::FullFiles,
            PipelineMode::Direct => ExtractMode::Diff,
        }
    }
}

/// Successful extraction result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedPayload {
    StructuredFiles(ModifiedFileMap),
    RawText(String),
}

#[derive(Debug, Clone)]
pub struct Extractor {
    extra_markers: Vec<Regex>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            extra_markers: Vec::new(),
        }
    }

    /// Add artifact markers on top of the built-in set.
    pub fn with_extra_markers(patterns: &[String]) -> Result<Self, String> {
        let mut extra_markers = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let re = Regex::new(pattern)
                .map_err(|err| format!("invalid artifact marker {pattern:?}: {err}"))?;
            extra_markers.push(re);
        }
        Ok(Self { extra_markers })
    }

    pub fn extract(&self, raw: &str, mode: ExtractMode) -> Result<ExtractedPayload, PatchError> {
        let text = normalize_line_endings(raw);
        let selected = select_region(&text, mode);
        let truncated = self.truncate_artifacts(&selected);

        match mode {
            ExtractMode::Diff => {
                if truncated.trim().is_empty() {
                    return Err(PatchError::EmptyExtraction);
                }
                Ok(ExtractedPayload::RawText(ensure_trailing_newline(&truncated)))
            }
            ExtractMode::FullFiles => {
                let files = parse_file_blocks(&truncated)?;
                if !files.is_empty() {
                    return Ok(ExtractedPayload::StructuredFiles(files));
                }
                if looks_like_prose(&text) {
                    Err(PatchError::MalformedResponse)
                } else {
                    Err(PatchError::EmptyExtraction)
                }
            }
        }
    }

    /// Cut `text` at the first line that matches an artifact marker.
    pub fn truncate_artifacts(&self, text: &str) -> String {
        let mut kept = String::new();
        for line in text.lines() {
            if self.is_artifact(line) {
                debug!(line, "truncating response at artifact marker");
                break;
            }
            kept.push_str(line);
            kept.push('\n');
        }
        kept
    }

    fn is_artifact(&self, line: &str) -> bool {
        DEFAULT_ARTIFACT_RES
            .iter()
            .chain(self.extra_markers.iter())
            .any(|re| re.is_match(line))
    }
}

fn select_region(text: &str, mode: ExtractMode) -> String {
    let fences = find_fences(text);
    let chosen = match mode {
        ExtractMode::FullFiles => fences.last(),
        ExtractMode::Diff => fences.first(),
    };
    let Some(chosen) = chosen else {
        return text.to_string();
    };

    if mode == ExtractMode::FullFiles && !has_file_marker(&chosen.body) && has_file_marker(text) {
        debug!("file markers sit outside the last fence; parsing whole response");
        return strip_wrapping_fences(text);
    }
    chosen.body.clone()
}

/// Drop fence lines that wrap a whole `FILE:` body.
///
/// An opener sits on the line right after the marker. Its closer is the last
/// fence before `---`, the next marker or the end of the response. Fences
/// inside a body that was not opened that way are content.
fn strip_wrapping_fences(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out = String::new();
    let mut wrapped = false;

    for (index, line) in lines.iter().enumerate() {
        let after_marker = index > 0 && file_marker(lines[index - 1]).is_some();
        if file_marker(line).is_some() || *line == BLOCK_END {
            wrapped = false;
        } else if is_fence_line(line) {
            if after_marker {
                wrapped = true;
                continue;
            }
            let closes_body = match lines.get(index + 1) {
                None => true,
                Some(next) => *next == BLOCK_END || file_marker(next).is_some(),
            };
            if wrapped && closes_body {
                wrapped = false;
                continue;
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn file_marker(line: &str) -> Option<&str> {
    line.strip_prefix(FILE_MARKER)
}

fn has_file_marker(text: &str) -> bool {
    text.lines().any(|line| file_marker(line).is_some())
}

fn looks_like_prose(text: &str) -> bool {
    !has_file_marker(text) && text.lines().any(|line| LIST_ITEM_RE.is_match(line))
}

/// Normalize a path written after `FILE:`.
pub fn clean_block_path(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_matches(|c| c == '`' || c == '"' || c == '\'')
        .trim();
    let forward = trimmed.replace('\\', "/");
    let mut path = forward.as_str();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path.to_string()
}

fn parse_file_blocks(text: &str) -> Result<ModifiedFileMap, PatchError> {
    let mut files = ModifiedFileMap::new();
    let mut open: Option<(String, Vec<&str>)> = None;

    for (index, line) in text.lines().enumerate() {
        if let Some(rest) = file_marker(line) {
            if let Some((path, body)) = open.take() {
                debug!(path = %path, "FILE block closed by the next FILE marker");
                finish_block(&mut files, path, &body);
            }
            let path = clean_block_path(rest);
            if path.is_empty() {
                return Err(PatchError::Parse(format!(
                    "FILE marker without a path on line {}",
                    index + 1
                )));
            }
            open = Some((path, Vec::new()));
        } else if line == BLOCK_END {
            if let Some((path, body)) = open.take() {
                finish_block(&mut files, path, &body);
            }
        } else if let Some((_, body)) = open.as_mut() {
            body.push(line);
        }
    }

    if let Some((path, body)) = open.take() {
        debug!(path = %path, "FILE block closed by end of response");
        finish_block(&mut files, path, &body);
    }

    Ok(files)
}

fn finish_block(files: &mut ModifiedFileMap, path: String, body: &[&str]) {
    let mut end = body.len();
    while end > 0 && body[end - 1].trim().is_empty() {
        end -= 1;
    }
    if end == 0 {
        warn!(path = %path, "dropping FILE block with an empty body");
        return;
    }
    if body[0].starts_with("\\n") {
        warn!(path = %path, "dropping FILE block that starts with an escaped newline");
        return;
    }

    let mut content = body[..end].join("\n");
    content.push('\n');
    if files.insert(path.clone(), content).is_some() {
        debug!(path = %path, "FILE block repeated; keeping the later body");
    }
}
