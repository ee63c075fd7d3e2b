//! Check evaluation and outcome recording.
//!
//! Evaluates case checks against the run report `patchgen` produced and
//! records each outcome with the evidence it was decided on.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use patchgen::io::report::RunReport;
use patchgen::synthesize::SynthesisNote;

use crate::case::Check;

/// Collected check outcomes for a run.
#[derive(Debug, Serialize, Deserialize)]
pub struct Judgment {
    pub checks: Vec<CheckOutcome>,
}

impl Judgment {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(CheckOutcome::passed)
    }
}

/// Result of evaluating a single check.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckOutcome {
    PatchValid {
        passed: bool,
        errors: usize,
    },
    ExtractionFails {
        kind: String,
        passed: bool,
        actual: Option<String>,
    },
    ErrorContains {
        text: String,
        passed: bool,
    },
    FileDiff {
        path: String,
        creation: Option<bool>,
        passed: bool,
    },
    Unchanged {
        path: String,
        passed: bool,
    },
    PatchApplies {
        passed: bool,
        stderr: Option<String>,
    },
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        match self {
            CheckOutcome::PatchValid { passed, .. }
            | CheckOutcome::ExtractionFails { passed, .. }
            | CheckOutcome::ErrorContains { passed, .. }
            | CheckOutcome::FileDiff { passed, .. }
            | CheckOutcome::Unchanged { passed, .. }
            | CheckOutcome::PatchApplies { passed, .. } => *passed,
        }
    }

    /// Stable label used to aggregate pass rates across runs.
    pub fn label(&self) -> String {
        match self {
            CheckOutcome::PatchValid { .. } => "patch_valid".to_string(),
            CheckOutcome::ExtractionFails { kind, .. } => format!("extraction_fails({kind})"),
            CheckOutcome::ErrorContains { text, .. } => format!("error_contains({text})"),
            CheckOutcome::FileDiff { path, .. } => format!("file_diff({path})"),
            CheckOutcome::Unchanged { path, .. } => format!("unchanged({path})"),
            CheckOutcome::PatchApplies { .. } => "patch_applies".to_string(),
        }
    }
}

/// Evaluate all checks against one run report.
#[instrument(skip_all, fields(check_count = checks.len()))]
pub fn run_checks(checks: &[Check], report: &RunReport) -> Judgment {
    let outcomes: Vec<CheckOutcome> = checks
        .iter()
        .map(|check| judge(check, report))
        .inspect(|outcome| debug!(check = %outcome.label(), passed = outcome.passed(), "check result"))
        .collect();
    Judgment { checks: outcomes }
}

fn judge(check: &Check, report: &RunReport) -> CheckOutcome {
    match check {
        Check::PatchValid => {
            let errors = report.errors.len() + report.failures.len();
            CheckOutcome::PatchValid {
                passed: report.extraction_error.is_none() && errors == 0,
                errors,
            }
        }
        Check::ExtractionFails { kind } => {
            let actual = report.extraction_error.as_ref().map(|err| err.code.clone());
            CheckOutcome::ExtractionFails {
                kind: kind.clone(),
                passed: actual.as_deref() == Some(kind.as_str()),
                actual,
            }
        }
        Check::ErrorContains { text } => CheckOutcome::ErrorContains {
            text: text.clone(),
            passed: report
                .feedback_lines()
                .iter()
                .any(|line| line.contains(text.as_str())),
        },
        Check::FileDiff { path, creation } => CheckOutcome::FileDiff {
            path: path.clone(),
            creation: *creation,
            passed: report.files.iter().any(|file| {
                file.path == *path && creation.is_none_or(|expected| file.creation == expected)
            }),
        },
        Check::Unchanged { path } => CheckOutcome::Unchanged {
            path: path.clone(),
            passed: report.notes.iter().any(
                |note| matches!(note, SynthesisNote::Unchanged { path: noted } if noted == path),
            ),
        },
        Check::PatchApplies => CheckOutcome::PatchApplies {
            passed: report.apply_check.as_ref().is_some_and(|check| check.applies),
            stderr: report
                .apply_check
                .as_ref()
                .filter(|check| !check.applies)
                .map(|check| check.stderr.clone()),
        },
    }
}

pub fn write_judgment(path: &Path, judgment: &Judgment) -> Result<()> {
    let contents = serde_json::to_string_pretty(judgment).context("serialize checks")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
