//! Workspace creation and management.
//!
//! Each eval run replays against an isolated git repository holding the
//! case snapshot as its only commit.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};

/// An isolated workspace for running a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Absolute path to the workspace root.
    pub root: PathBuf,
    /// Workspace directory name (includes case id, timestamp, and random suffix).
    pub name: String,
}

/// Create a workspace holding `files` committed as the snapshot.
pub fn create_workspace(
    base_dir: &Path,
    case_id: &str,
    files: &BTreeMap<String, String>,
) -> Result<Workspace> {
    fs::create_dir_all(base_dir)
        .with_context(|| format!("create workspace dir {}", base_dir.display()))?;

    let timestamp = generate_timestamp();
    let short_id = generate_short_id();
    let name = build_workspace_name(case_id, &timestamp, &short_id);
    let root = base_dir.join(&name);
    fs::create_dir_all(&root)
        .with_context(|| format!("create workspace root {}", root.display()))?;

    run_git(&root, &["init", "-q"])?;
    run_git(&root, &["config", "user.name", "Patchgen Eval"])?;
    run_git(
        &root,
        &["config", "user.email", "patchgen-eval@local.invalid"],
    )?;
    run_git(&root, &["config", "core.autocrlf", "false"])?;

    write_snapshot(&root, files)?;

    run_git(&root, &["add", "-A"])?;
    run_git(
        &root,
        &["commit", "-q", "--allow-empty", "-m", "chore(eval): snapshot"],
    )?;

    let status = run_git(&root, &["status", "--porcelain"])?;
    if !status.trim().is_empty() {
        bail!("workspace has uncommitted changes after snapshot");
    }

    Ok(Workspace { root, name })
}

pub fn build_workspace_name(case_id: &str, timestamp: &str, short_id: &str) -> String {
    format!("{case_id}_{timestamp}_{short_id}")
}

fn write_snapshot(root: &Path, files: &BTreeMap<String, String>) -> Result<()> {
    for (path, content) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&full, content).with_context(|| format!("write {}", full.display()))?;
    }
    Ok(())
}

fn generate_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

fn generate_short_id() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase()
}

fn run_git(root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .with_context(|| format!("run git {:?}", args))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {:?} failed: {}", args, stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn workspace_name_uses_expected_format() {
        let name = build_workspace_name("case", "20260118_120000", "abc123");
        assert_eq!(name, "case_20260118_120000_abc123");
    }

    #[test]
    fn creates_workspace_with_committed_snapshot() {
        let temp = tempdir().expect("tempdir");
        let files = BTreeMap::from([
            ("README.md".to_string(), "# demo\n".to_string()),
            ("src/lib.rs".to_string(), "pub fn a() {}\n".to_string()),
        ]);
        let workspace = create_workspace(temp.path(), "case", &files).expect("workspace");

        assert!(workspace.root.join(".git").exists());
        assert!(workspace.name.starts_with("case_"));
        assert_eq!(
            fs::read_to_string(workspace.root.join("src/lib.rs")).expect("read"),
            "pub fn a() {}\n"
        );

        let tracked = run_git(&workspace.root, &["ls-files"]).expect("ls-files");
        assert_eq!(tracked, "README.md\nsrc/lib.rs\n");
        let status = run_git(&workspace.root, &["status", "--porcelain"]).expect("status");
        assert!(status.trim().is_empty());
    }

    #[test]
    fn empty_snapshot_still_commits() {
        let temp = tempdir().expect("tempdir");
        let workspace = create_workspace(temp.path(), "empty", &BTreeMap::new()).expect("workspace");
        let head = run_git(&workspace.root, &["rev-parse", "HEAD"]).expect("head");
        assert_eq!(head.trim().len(), 40);
    }
}
