//! Run artifacts: the patch file and its JSON report.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::PatchError;
use crate::core::types::{PipelineMode, ValidationError};
use crate::io::git::ApplyCheck;
use crate::pipeline::{FileSummary, PipelineOutcome};
use crate::synthesize::SynthesisNote;

/// A typed pipeline error flattened for JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
}

impl From<&PatchError> for ErrorRecord {
    fn from(err: &PatchError) -> Self {
        let path = match err {
            PatchError::DiffComputation { path, .. } => Some(path.clone()),
            _ => None,
        };
        Self {
            code: err.code().to_string(),
            path,
            message: err.to_string(),
        }
    }
}

/// Machine-readable summary of one `patchgen run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: PipelineMode,
    pub valid: bool,
    /// Set when extraction failed and no patch was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<ErrorRecord>,
    #[serde(default)]
    pub errors: Vec<ValidationError>,
    #[serde(default)]
    pub notes: Vec<SynthesisNote>,
    #[serde(default)]
    pub failures: Vec<ErrorRecord>,
    #[serde(default)]
    pub files: Vec<FileSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_check: Option<ApplyCheck>,
}

impl RunReport {
    pub fn from_outcome(outcome: &PipelineOutcome) -> Self {
        Self {
            mode: outcome.mode,
            valid: outcome.is_clean(),
            extraction_error: None,
            errors: outcome.errors.clone(),
            notes: outcome.notes.clone(),
            failures: outcome.failures.iter().map(ErrorRecord::from).collect(),
            files: outcome.files.clone(),
            apply_check: None,
        }
    }

    pub fn from_extraction_error(mode: PipelineMode, err: &PatchError) -> Self {
        Self {
            mode,
            valid: false,
            extraction_error: Some(ErrorRecord::from(err)),
            errors: Vec::new(),
            notes: Vec::new(),
            failures: Vec::new(),
            files: Vec::new(),
            apply_check: None,
        }
    }

    /// Attach an apply-check result; a failed check makes the run invalid.
    pub fn with_apply_check(mut self, check: ApplyCheck) -> Self {
        self.valid &= check.applies;
        self.apply_check = Some(check);
        self
    }

    /// Messages a retry prompt should show the model.
    pub fn feedback_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(err) = &self.extraction_error {
            lines.push(err.message.clone());
        }
        lines.extend(self.errors.iter().map(|err| err.message.clone()));
        lines.extend(self.failures.iter().map(|failure| failure.message.clone()));
        if let Some(check) = &self.apply_check
            && !check.applies
        {
            lines.push(format!("git apply --check failed: {}", check.stderr));
        }
        lines
    }
}

/// Write the patch text as produced (already LF with one trailing newline).
pub fn write_patch(path: &Path, patch_text: &str) -> Result<()> {
    write_atomic(path, patch_text)
}

pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(report).context("serialize run report")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

pub fn read_report(path: &Path) -> Result<RunReport> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Write via a sibling temp file and rename it into place.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let file_name = path
        .file_name()
        .with_context(|| format!("path has no file name {}", path.display()))?;
    let tmp_path = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome() -> PipelineOutcome {
        PipelineOutcome {
            mode: PipelineMode::TwoStep,
            patch_text: String::new(),
            errors: vec![ValidationError::hunk(2, "Hunk 2: old line count mismatch")],
            notes: vec![SynthesisNote::Unchanged {
                path: "same.txt".to_string(),
            }],
            failures: vec![PatchError::DiffComputation {
                path: "b.txt".to_string(),
                reason: "timed out".to_string(),
            }],
            files: Vec::new(),
        }
    }

    #[test]
    fn report_round_trips_through_json() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out").join("report.json");
        let report = RunReport::from_outcome(&outcome());

        write_report(&path, &report).expect("write");
        let raw = fs::read_to_string(&path).expect("read raw");
        assert!(raw.ends_with("}\n"));
        assert!(raw.contains("\"kind\": \"unchanged\""));
        assert!(raw.contains("\"code\": \"diff_computation_error\""));

        let loaded = read_report(&path).expect("read");
        assert_eq!(loaded, report);
        assert!(!loaded.valid);
    }

    #[test]
    fn feedback_lists_errors_then_failures() {
        let report = RunReport::from_outcome(&outcome()).with_apply_check(ApplyCheck {
            applies: false,
            stderr: "error: patch failed: a.txt:1".to_string(),
        });
        assert_eq!(
            report.feedback_lines(),
            vec![
                "Hunk 2: old line count mismatch".to_string(),
                "diff computation failed for b.txt: timed out".to_string(),
                "git apply --check failed: error: patch failed: a.txt:1".to_string(),
            ]
        );
    }

    #[test]
    fn extraction_error_report_is_invalid() {
        let report =
            RunReport::from_extraction_error(PipelineMode::Direct, &PatchError::EmptyExtraction);
        assert!(!report.valid);
        assert_eq!(
            report.extraction_error.as_ref().map(|err| err.code.as_str()),
            Some("empty_extraction")
        );
    }

    #[test]
    fn write_patch_replaces_existing_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("fix.patch");
        write_patch(&path, "old\n").expect("first");
        write_patch(&path, "new\n").expect("second");
        assert_eq!(fs::read_to_string(&path).expect("read"), "new\n");
        assert!(!temp.path().join(".fix.patch.tmp").exists());
    }
}
