//! Repository snapshot loading.
//!
//! Requested paths come from the model and may be misspelled by case. A path
//! that does not exist verbatim is looked up with a case-insensitive walk of
//! the tree; files that still cannot be found are left out so the pipeline
//! treats them as new.

use std::fs;
use std::path::{Component, Path};

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::core::path::{PathProbe, PathResolution, resolve_among};
use crate::core::types::FileContentMap;

/// Every regular file below a root, as `/`-separated relative paths.
#[derive(Debug, Clone)]
pub struct RepoProbe {
    files: Vec<String>,
}

impl RepoProbe {
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn scan(root: &Path) -> Result<Self> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git")
        {
            let entry = entry.with_context(|| format!("walk {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            files.push(to_slash_path(relative));
        }
        files.sort();
        debug!(files = files.len(), "scanned repository");
        Ok(Self { files })
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }
}

impl PathProbe for RepoProbe {
    fn resolve(&self, requested: &str) -> PathResolution {
        resolve_among(self.files.iter().map(String::as_str), requested)
    }
}

/// Read the requested files below `root`, keyed by their real relative path.
#[instrument(skip_all, fields(root = %root.display(), requested = paths.len()))]
pub fn load_snapshot(root: &Path, paths: &[String]) -> Result<FileContentMap> {
    let mut snapshot = FileContentMap::new();
    let mut probe: Option<RepoProbe> = None;

    for requested in paths {
        if !is_inside_root(requested) {
            warn!(path = %requested, "path escapes the repository root; skipping");
            continue;
        }

        let real = if root.join(requested).is_file() {
            Some(requested.clone())
        } else {
            if probe.is_none() {
                probe = Some(RepoProbe::scan(root)?);
            }
            match probe.as_ref().map(|probe| probe.resolve(requested)) {
                Some(PathResolution::Exact(path) | PathResolution::CaseResolved(path)) => {
                    debug!(requested = %requested, resolved = %path, "resolved by case-insensitive walk");
                    Some(path)
                }
                Some(PathResolution::Ambiguous(candidates)) => {
                    warn!(requested = %requested, ?candidates, "ambiguous path; treating as new");
                    None
                }
                Some(PathResolution::Missing) | None => {
                    debug!(requested = %requested, "file not found; treating as new");
                    None
                }
            }
        };

        if let Some(real) = real {
            let full = root.join(&real);
            let bytes = fs::read(&full).with_context(|| format!("read {}", full.display()))?;
            let text = String::from_utf8(bytes)
                .with_context(|| format!("{} is not valid UTF-8", full.display()))?;
            snapshot.insert(real, text);
        }
    }

    Ok(snapshot)
}

fn is_inside_root(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
