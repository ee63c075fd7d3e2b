//! `patchgen run`: response file in, patch and report out.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::error::PatchError;
use crate::core::extract::{ExtractMode, ExtractedPayload, Extractor};
use crate::core::types::{DEV_NULL, PipelineMode};
use crate::core::validator::Validator;
use crate::exit_codes;
use crate::io::config::PatchgenConfig;
use crate::io::differ::DiffEngine;
use crate::io::git::Git;
use crate::io::repo::load_snapshot;
use crate::io::report::{RunReport, write_patch, write_report};
use crate::pipeline::Pipeline;

/// Inputs of one `patchgen run`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub repo: PathBuf,
    pub mode: PipelineMode,
    pub response: String,
    pub out: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub check_apply: bool,
}

/// What a run produced and how the CLI should exit.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report: RunReport,
    /// `None` when extraction failed.
    pub patch_text: Option<String>,
    pub exit_code: i32,
}

/// Repository paths the response talks about.
///
/// TwoStep: every `FILE:` path. Direct: every path named by a file header.
pub fn requested_paths(
    extractor: &Extractor,
    validator: &Validator,
    mode: PipelineMode,
    response: &str,
) -> Result<Vec<String>, PatchError> {
    let paths: BTreeSet<String> = match extractor.extract(response, ExtractMode::from(mode))? {
        ExtractedPayload::StructuredFiles(files) => files.paths().map(str::to_string).collect(),
        ExtractedPayload::RawText(text) => validator
            .validate(&text)
            .hunks
            .iter()
            .flat_map(|hunk| [hunk.path.clone(), hunk.old_path.clone()])
            .flatten()
            .filter(|path| path != DEV_NULL)
            .collect(),
    };
    Ok(paths.into_iter().collect())
}

/// Run the configured pipeline against the repository at `opts.repo`.
#[instrument(skip_all, fields(repo = %opts.repo.display(), mode = %opts.mode))]
pub fn run_pipeline(config: &PatchgenConfig, opts: &RunOptions) -> Result<RunSummary> {
    let pipeline = Pipeline::from_config(config)?;
    run_with(&pipeline, config, opts)
}

/// [`run_pipeline`] with an explicit pipeline, so tests can script the engine.
pub fn run_with<E: DiffEngine>(
    pipeline: &Pipeline<E>,
    config: &PatchgenConfig,
    opts: &RunOptions,
) -> Result<RunSummary> {
    let extractor = config.extractor()?;
    let validator = config.validator();

    let paths = match requested_paths(&extractor, &validator, opts.mode, &opts.response) {
        Ok(paths) => paths,
        Err(err) => return extraction_failed(opts, &err),
    };
    debug!(paths = paths.len(), "loading repository snapshot");
    let original = load_snapshot(&opts.repo, &paths)?;

    let outcome = match pipeline.run(opts.mode, &original, &opts.response) {
        Ok(outcome) => outcome,
        Err(err) => return extraction_failed(opts, &err),
    };

    let mut report = RunReport::from_outcome(&outcome);
    // kept alive until the apply check has read the patch
    let scratch = tempfile::tempdir().context("create scratch dir")?;
    let patch_path = match &opts.out {
        Some(out) => out.clone(),
        None => scratch.path().join("patch.diff"),
    };
    if opts.out.is_some() || (opts.check_apply && !outcome.is_empty()) {
        write_patch(&patch_path, &outcome.patch_text)?;
    }

    if opts.check_apply && !outcome.is_empty() {
        let check = Git::new(&opts.repo).apply_check(&absolute(&patch_path)?)?;
        report = report.with_apply_check(check);
    }

    if let Some(path) = &opts.report {
        write_report(path, &report)?;
    }

    let exit_code = if !report.valid {
        exit_codes::PATCH_INVALID
    } else if outcome.is_empty() {
        exit_codes::NO_CHANGES
    } else {
        exit_codes::OK
    };

    Ok(RunSummary {
        report,
        patch_text: Some(outcome.patch_text),
        exit_code,
    })
}

fn extraction_failed(opts: &RunOptions, err: &PatchError) -> Result<RunSummary> {
    let report = RunReport::from_extraction_error(opts.mode, err);
    if let Some(path) = &opts.report {
        write_report(path, &report)?;
    }
    Ok(RunSummary {
        report,
        patch_text: None,
        exit_code: exit_codes::EXTRACTION_FAILED,
    })
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("resolve current directory")?;
    Ok(cwd.join(path))
}
