//! Case file parsing and validation.
//!
//! Cases are TOML files pairing a recorded LLM response with the repository
//! snapshot it was written against, plus checks on what the pipeline produces.
//! See `eval/cases/` for examples.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use patchgen::core::types::PipelineMode;
use patchgen::io::config::DiffProgram;

/// Error codes an `extraction_fails` check may name.
pub const EXTRACTION_KINDS: &[&str] = &["empty_extraction", "malformed_response", "parse_error"];

/// A parsed case file: response, snapshot, overrides and checks.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CaseFile {
    pub case: CaseMeta,
    /// Original snapshot, repository-relative path to content.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    #[serde(default)]
    pub config: CaseConfig,
    #[serde(default)]
    pub checks: Vec<Check>,
}

/// Case metadata: identifier, mode and the recorded response.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CaseMeta {
    /// Unique identifier (slug format: `[a-z0-9_-]+`).
    pub id: String,
    #[serde(default)]
    pub mode: PipelineMode,
    /// Raw LLM response replayed through the pipeline.
    pub response: String,
}

/// Pipeline configuration overrides for the case.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CaseConfig {
    pub require_context_padding: Option<bool>,
    pub diff_program: Option<DiffProgram>,
}

/// Expectation checked against the run report.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Check {
    /// Extraction succeeded and the patch has no errors or failures.
    PatchValid,
    /// Extraction failed with the given error code.
    ExtractionFails { kind: String },
    /// Some error or failure message contains `text`.
    ErrorContains { text: String },
    /// The patch has a section for `path`, optionally checking creation.
    FileDiff {
        path: String,
        creation: Option<bool>,
    },
    /// `path` was reported as unchanged.
    Unchanged { path: String },
    /// `git apply --check` accepted the patch in the workspace.
    PatchApplies,
}

impl CaseFile {
    /// Load and validate a case file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read case {}", path.display()))?;
        let case: CaseFile =
            toml::from_str(&contents).with_context(|| format!("parse case {}", path.display()))?;
        case.validate()
            .with_context(|| format!("validate case {}", path.display()))?;
        Ok(case)
    }

    #[cfg(test)]
    pub fn parse_str(contents: &str) -> Result<Self> {
        let case: CaseFile = toml::from_str(contents).context("parse case")?;
        case.validate()?;
        Ok(case)
    }

    fn validate(&self) -> Result<()> {
        validate_case_id(&self.case.id)?;
        if self.case.response.trim().is_empty() {
            bail!("case.response must be non-empty");
        }
        for path in self.files.keys() {
            validate_snapshot_path(path).with_context(|| format!("files[{path:?}] invalid"))?;
        }
        if self.checks.is_empty() {
            bail!("checks must be a non-empty array");
        }
        for (index, check) in self.checks.iter().enumerate() {
            check
                .validate()
                .with_context(|| format!("checks[{}] invalid", index))?;
        }
        Ok(())
    }
}

impl Check {
    fn validate(&self) -> Result<()> {
        match self {
            Check::ExtractionFails { kind } => {
                if !EXTRACTION_KINDS.contains(&kind.as_str()) {
                    bail!(
                        "extraction_fails.kind must be one of {}",
                        EXTRACTION_KINDS.join(", ")
                    );
                }
            }
            Check::ErrorContains { text } => {
                if text.trim().is_empty() {
                    bail!("error_contains.text must be non-empty");
                }
            }
            Check::FileDiff { path, .. } | Check::Unchanged { path } => {
                if path.trim().is_empty() {
                    bail!("path must be non-empty");
                }
            }
            Check::PatchValid | Check::PatchApplies => {}
        }
        Ok(())
    }
}

/// Discover and load all case files from a directory.
///
/// Returns cases sorted by id. Errors if duplicate ids are found.
pub fn discover_cases(dir: &Path) -> Result<Vec<CaseFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut cases = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read cases dir {}", dir.display()))? {
        let entry = entry.context("read case entry")?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        cases.push(CaseFile::load(&path)?);
    }
    cases.sort_by(|left, right| left.case.id.cmp(&right.case.id));
    for pair in cases.windows(2) {
        if pair[0].case.id == pair[1].case.id {
            return Err(anyhow!("duplicate case.id {}", pair[0].case.id));
        }
    }
    Ok(cases)
}

fn validate_case_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("case.id must be non-empty");
    }
    if id.contains('/') || id.contains('\\') {
        bail!("case.id must not contain path separators");
    }
    if id.contains("..") {
        bail!("case.id must not contain '..'");
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("case.id must use [a-z0-9_-] only");
    }
    Ok(())
}

fn validate_snapshot_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        bail!("path must be non-empty");
    }
    if path.starts_with('/') || path.contains('\\') {
        bail!("path must be relative and use '/'");
    }
    if path.split('/').any(|part| part == ".." || part == ".git") {
        bail!("path must stay inside the workspace");
    }
    Ok(())
}
