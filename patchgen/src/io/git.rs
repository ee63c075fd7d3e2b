//! Git adapter for checking that a patch applies.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Result of `git apply --check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyCheck {
    pub applies: bool,
    pub stderr: String,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Dry-run `patch` against the worktree without touching it.
    #[instrument(skip_all, fields(patch = %patch.display()))]
    pub fn apply_check(&self, patch: &Path) -> Result<ApplyCheck> {
        let patch_arg = patch.to_string_lossy();
        let output = self.run(&["apply", "--check", "--verbose", &patch_arg])?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let applies = output.status.success();
        if applies {
            debug!("patch applies cleanly");
        } else {
            warn!(stderr = %stderr, "patch does not apply");
        }
        Ok(ApplyCheck { applies, stderr })
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}
