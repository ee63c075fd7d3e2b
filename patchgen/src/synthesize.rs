//! Mechanical diff synthesis from full replacement files.
//!
//! For every file the model rewrote, compare the original snapshot to the new
//! text through a [`DiffEngine`], rewrite the engine's scratch paths to the
//! logical repository path and parse the result into a [`FileDiff`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::error::PatchError;
use crate::core::headers::{HeaderTarget, rewrite_headers};
use crate::core::normalize::normalize_line_endings;
use crate::core::path::{PathProbe, PathResolution};
use crate::core::types::{FileContentMap, FileDiff, ModifiedFileMap, Patch};
use crate::core::unified::parse_patch;
use crate::io::differ::{DiffEngine, DiffOutcome};

/// Non-fatal observation made while synthesizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SynthesisNote {
    /// The model named a file with a different spelling than the repository.
    CaseResolved { requested: String, resolved: String },
    /// Several files matched the requested name; it was treated as new.
    Ambiguous {
        requested: String,
        candidates: Vec<String>,
    },
    /// The replacement equals the original; no diff was emitted.
    Unchanged { path: String },
}

#[derive(Debug, Clone, Default)]
pub struct SynthesisReport {
    pub patch: Patch,
    pub notes: Vec<SynthesisNote>,
    /// Per-file `DiffComputation` errors; other files still made it into `patch`.
    pub failures: Vec<PatchError>,
}

/// Diff every file of `modified` against `original`, in `modified` order.
#[instrument(skip_all, fields(files = modified.len()))]
pub fn synthesize(
    original: &FileContentMap,
    modified: &ModifiedFileMap,
    engine: &dyn DiffEngine,
) -> SynthesisReport {
    let mut report = SynthesisReport::default();
    let mut patched: BTreeSet<String> = BTreeSet::new();

    for (requested, content) in modified.iter() {
        let resolution = original.resolve(requested);
        let target = match &resolution {
            PathResolution::Exact(path) => path.clone(),
            PathResolution::CaseResolved(path) => {
                debug!(requested, resolved = %path, "resolved path by case-insensitive match");
                report.notes.push(SynthesisNote::CaseResolved {
                    requested: requested.to_string(),
                    resolved: path.clone(),
                });
                path.clone()
            }
            PathResolution::Ambiguous(candidates) => {
                warn!(requested, ?candidates, "ambiguous path; treating as a new file");
                report.notes.push(SynthesisNote::Ambiguous {
                    requested: requested.to_string(),
                    candidates: candidates.clone(),
                });
                requested.to_string()
            }
            PathResolution::Missing => requested.to_string(),
        };

        if !patched.insert(target.clone()) {
            warn!(requested, target = %target, "second replacement for an already patched file");
            report.failures.push(PatchError::DiffComputation {
                path: target,
                reason: format!("{requested} resolves to a file that is already patched"),
            });
            continue;
        }

        let source = resolution
            .resolved()
            .and_then(|path| original.get(path))
            .map(|text| normalize_line_endings(text));
        let replacement = normalize_line_endings(content);

        match diff_one(engine, &target, source.as_deref(), &replacement) {
            Ok(Some(file)) => {
                debug!(path = %target, hunks = file.hunks.len(), creation = file.is_creation(), "file diff synthesized");
                report.patch.files.push(file);
            }
            Ok(None) => {
                warn!(path = %target, "replacement is identical to the original; no diff emitted");
                report.notes.push(SynthesisNote::Unchanged { path: target });
            }
            Err(reason) => {
                warn!(path = %target, reason = %reason, "diff computation failed");
                report
                    .failures
                    .push(PatchError::DiffComputation { path: target, reason });
            }
        }
    }

    report
}

fn diff_one(
    engine: &dyn DiffEngine,
    path: &str,
    source: Option<&str>,
    replacement: &str,
) -> Result<Option<FileDiff>, String> {
    let creation = source.is_none();
    let raw = match engine
        .diff(path, source, replacement)
        .map_err(|err| format!("{err:#}"))?
    {
        DiffOutcome::Identical => return Ok(None),
        DiffOutcome::Changed(raw) => raw,
    };

    let rewritten = rewrite_headers(&raw, HeaderTarget { path, creation });
    let mut parsed = parse_patch(&rewritten)?;
    if parsed.files.len() != 1 {
        return Err(format!(
            "diff engine produced {} file sections, expected 1",
            parsed.files.len()
        ));
    }
    let file = parsed.files.remove(0);
    if file.path() != path {
        return Err(format!(
            "diff headers name {} instead of {path}",
            file.path()
        ));
    }
    if file.is_creation() != creation {
        return Err(format!(
            "diff headers disagree on whether {path} is a new file"
        ));
    }
    Ok(Some(file))
}
