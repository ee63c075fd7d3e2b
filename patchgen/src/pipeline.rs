//! Pipeline orchestration: LLM response in, patch text plus errors out.
//!
//! The mode is fixed per invocation. TwoStep extracts full files and lets the
//! synthesizer compute the diff; Direct extracts the model's own diff and
//! validates it structurally. Extraction failures are fatal; everything after
//! extraction is reported rather than raised.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::error::PatchError;
use crate::core::extract::{ExtractMode, ExtractedPayload, Extractor};
use crate::core::path::PathProbe;
use crate::core::types::{FileContentMap, Patch, PipelineMode, ValidationError};
use crate::core::validator::{HunkSummary, Validator, check_rendered_counts};
use crate::io::config::PatchgenConfig;
use crate::io::differ::{DiffEngine, ExternalDiffEngine};
use crate::synthesize::{SynthesisNote, synthesize};

/// Per-file line totals of the produced patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub creation: bool,
    pub added: usize,
    pub removed: usize,
}

/// Everything one pipeline invocation produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub mode: PipelineMode,
    /// Unified-diff text; empty when nothing changed.
    pub patch_text: String,
    pub errors: Vec<ValidationError>,
    pub notes: Vec<SynthesisNote>,
    pub failures: Vec<PatchError>,
    pub files: Vec<FileSummary>,
}

impl PipelineOutcome {
    /// No validation errors and no per-file failures.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.failures.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.patch_text.is_empty()
    }

    /// Strict policy: return the patch only if it is clean.
    ///
    /// Per-file failures are folded into the error list as file-level entries.
    pub fn accept(self) -> Result<String, PatchError> {
        if self.is_clean() {
            return Ok(self.patch_text);
        }
        let mut errors = self.errors;
        errors.extend(
            self.failures
                .iter()
                .map(|failure| ValidationError::document(failure.to_string())),
        );
        Err(PatchError::ValidationFailure(errors))
    }
}

/// The configured pipeline: extractor, validator and diff engine.
pub struct Pipeline<E> {
    extractor: Extractor,
    validator: Validator,
    engine: E,
}

impl Pipeline<ExternalDiffEngine> {
    pub fn from_config(config: &PatchgenConfig) -> Result<Self> {
        Ok(Self::new(
            config.extractor()?,
            config.validator(),
            ExternalDiffEngine::from_config(&config.diff),
        ))
    }
}

impl<E: DiffEngine> Pipeline<E> {
    pub fn new(extractor: Extractor, validator: Validator, engine: E) -> Self {
        Self {
            extractor,
            validator,
            engine,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[instrument(skip_all, fields(mode = %mode, original_files = original.len()))]
    pub fn run(
        &self,
        mode: PipelineMode,
        original: &FileContentMap,
        response: &str,
    ) -> Result<PipelineOutcome, PatchError> {
        let payload = self
            .extractor
            .extract(response, ExtractMode::from(mode))
            .inspect_err(|err| warn!(code = err.code(), "extraction failed"))?;

        let outcome = match (mode, payload) {
            (PipelineMode::TwoStep, ExtractedPayload::StructuredFiles(files)) => {
                debug!(files = files.len(), "extracted replacement files");
                let report = synthesize(original, &files, &self.engine);
                let patch_text = report.patch.render();
                let errors = check_rendered_counts(&patch_text);
                PipelineOutcome {
                    mode,
                    patch_text,
                    errors,
                    notes: report.notes,
                    failures: report.failures,
                    files: patch_summaries(&report.patch),
                }
            }
            (PipelineMode::Direct, ExtractedPayload::RawText(text)) => {
                let report = self.validator.validate(&text);
                let mut errors = report.errors;
                errors.extend(creation_conflicts(&report.hunks, original));
                PipelineOutcome {
                    mode,
                    files: hunk_summaries(&report.hunks),
                    patch_text: text,
                    errors,
                    notes: Vec::new(),
                    failures: Vec::new(),
                }
            }
            (mode, _) => {
                return Err(PatchError::Parse(format!(
                    "extractor returned the wrong payload kind for {mode} mode"
                )));
            }
        };

        info!(
            valid = outcome.is_clean(),
            errors = outcome.errors.len(),
            failures = outcome.failures.len(),
            files = outcome.files.len(),
            "pipeline finished"
        );
        Ok(outcome)
    }
}

/// Direct-mode check: a file the model was shown must not be "created".
fn creation_conflicts(hunks: &[HunkSummary], original: &FileContentMap) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut reported: Vec<&str> = Vec::new();
    for hunk in hunks {
        let Some(path) = hunk.path.as_deref() else {
            continue;
        };
        if !hunk.declares_creation() || reported.contains(&path) {
            continue;
        }
        if original.resolve(path).resolved().is_some() {
            reported.push(path);
            errors.push(ValidationError::hunk(
                hunk.number,
                format!(
                    "Hunk {}: creates {path}, which already exists in the repository",
                    hunk.number
                ),
            ));
        }
    }
    errors
}

fn patch_summaries(patch: &Patch) -> Vec<FileSummary> {
    patch
        .files
        .iter()
        .map(|file| {
            let (added, removed) = file.stats();
            FileSummary {
                path: file.path().to_string(),
                creation: file.is_creation(),
                added,
                removed,
            }
        })
        .collect()
}

fn hunk_summaries(hunks: &[HunkSummary]) -> Vec<FileSummary> {
    let mut order: Vec<String> = Vec::new();
    let mut by_path: BTreeMap<String, FileSummary> = BTreeMap::new();
    for hunk in hunks {
        let Some(path) = hunk.path.clone() else {
            continue;
        };
        let entry = by_path.entry(path.clone()).or_insert_with(|| {
            order.push(path.clone());
            FileSummary {
                path,
                creation: false,
                added: 0,
                removed: 0,
            }
        });
        entry.creation |= hunk.declares_creation();
        entry.added += hunk.counts.added;
        entry.removed += hunk.counts.removed;
    }
    order
        .into_iter()
        .filter_map(|path| by_path.remove(&path))
        .collect()
}
