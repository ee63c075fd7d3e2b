//! Test-only helpers: snapshot builders, a scripted diff engine and a
//! throwaway git repository.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Result, anyhow};

use crate::core::types::{FileContentMap, ModifiedFileMap};
use crate::io::differ::{DiffEngine, DiffOutcome};

/// Build a `FileContentMap` from `(path, content)` pairs.
pub fn original_map(entries: &[(&str, &str)]) -> FileContentMap {
    entries
        .iter()
        .map(|(path, content)| ((*path).to_string(), (*content).to_string()))
        .collect()
}

/// Build a `ModifiedFileMap` keeping the given order.
pub fn modified_map(entries: &[(&str, &str)]) -> ModifiedFileMap {
    entries.iter().copied().collect()
}

#[derive(Debug, Clone)]
enum Scripted {
    Identical,
    Changed(String),
    Failing(String),
}

/// A `DiffEngine` that answers from a script and records every call.
#[derive(Debug, Default)]
pub struct ScriptedDiffEngine {
    script: BTreeMap<String, Scripted>,
    calls: RefCell<Vec<(String, Option<String>)>>,
}

impl ScriptedDiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identical(mut self, path: &str) -> Self {
        self.script.insert(path.to_string(), Scripted::Identical);
        self
    }

    pub fn changed(mut self, path: &str, raw: &str) -> Self {
        self.script
            .insert(path.to_string(), Scripted::Changed(raw.to_string()));
        self
    }

    pub fn failing(mut self, path: &str, reason: &str) -> Self {
        self.script
            .insert(path.to_string(), Scripted::Failing(reason.to_string()));
        self
    }

    /// `(path, original)` for every call, in call order.
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.borrow().clone()
    }
}

impl DiffEngine for ScriptedDiffEngine {
    fn diff(&self, path: &str, original: Option<&str>, _modified: &str) -> Result<DiffOutcome> {
        self.calls
            .borrow_mut()
            .push((path.to_string(), original.map(str::to_string)));
        match self.script.get(path) {
            Some(Scripted::Identical) => Ok(DiffOutcome::Identical),
            Some(Scripted::Changed(raw)) => Ok(DiffOutcome::Changed(raw.clone())),
            Some(Scripted::Failing(reason)) => Err(anyhow!("{reason}")),
            None => Err(anyhow!("no scripted diff for {path}")),
        }
    }
}

/// A temporary git repository with a committed snapshot.
pub struct TestRepo {
    _temp: tempfile::TempDir,
    root: PathBuf,
}

impl TestRepo {
    /// Create a repo, write `files` and commit them.
    pub fn with_files(files: &[(&str, &str)]) -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let root = temp.path().to_path_buf();
        git(&root, &["init", "-q"])?;
        git(&root, &["config", "user.email", "patchgen@example.com"])?;
        git(&root, &["config", "user.name", "patchgen"])?;
        git(&root, &["config", "core.autocrlf", "false"])?;
        for (path, content) in files {
            let full = root.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(full, content)?;
        }
        git(&root, &["add", "-A"])?;
        git(&root, &["commit", "-q", "--allow-empty", "-m", "snapshot"])?;
        Ok(Self { _temp: temp, root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn read(&self, path: &str) -> Result<String> {
        Ok(fs::read_to_string(self.root.join(path))?)
    }

    pub fn write(&self, path: &str, content: &str) -> Result<()> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(fs::write(full, content)?)
    }
}

fn git(root: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new("git").args(args).current_dir(root).output()?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}
