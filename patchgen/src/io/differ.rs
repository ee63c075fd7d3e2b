//! Line-diff engines.
//!
//! The synthesizer only needs "are these texts identical, and if not, what is
//! the raw unified diff". Production uses an external program on temp files;
//! tests script the answers.

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::io::config::{DiffConfig, DiffProgram};
use crate::io::process::{ProcessLimits, run_command_with_timeout};

const OLD_DIR: &str = "old";
const NEW_DIR: &str = "new";

/// Result of comparing two texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    Identical,
    /// Raw unified diff, headers still naming the engine's own files.
    Changed(String),
}

/// Computes a unified diff between two LF-normalized texts.
pub trait DiffEngine {
    /// `original` is `None` when the file does not exist yet.
    fn diff(&self, path: &str, original: Option<&str>, modified: &str) -> Result<DiffOutcome>;
}

/// Runs `git diff --no-index` or `diff -u` on a scratch directory.
#[derive(Debug, Clone)]
pub struct ExternalDiffEngine {
    program: DiffProgram,
    context_lines: u32,
    limits: ProcessLimits,
}

impl ExternalDiffEngine {
    pub fn new(program: DiffProgram, context_lines: u32, limits: ProcessLimits) -> Self {
        Self {
            program,
            context_lines,
            limits,
        }
    }

    pub fn from_config(config: &DiffConfig) -> Self {
        Self::new(config.program, config.context_lines, config.limits())
    }

    fn command(&self, workdir: &Path, old: &str, new: &str) -> Command {
        let context = format!("-U{}", self.context_lines);
        let mut cmd = match self.program {
            DiffProgram::Git => {
                let mut cmd = Command::new("git");
                cmd.args([
                    "-c",
                    "core.autocrlf=false",
                    "diff",
                    "--no-index",
                    "--no-color",
                    "--no-ext-diff",
                    "--text",
                    &context,
                    "--",
                    old,
                    new,
                ]);
                cmd
            }
            DiffProgram::Diff => {
                let mut cmd = Command::new("diff");
                cmd.args(["-u", &context, "-a", old, new]);
                cmd
            }
        };
        cmd.current_dir(workdir);
        cmd
    }
}

impl DiffEngine for ExternalDiffEngine {
    #[instrument(skip_all, fields(path = %path, program = ?self.program))]
    fn diff(&self, path: &str, original: Option<&str>, modified: &str) -> Result<DiffOutcome> {
        let scratch = tempfile::tempdir().context("create diff scratch dir")?;
        let name = scratch_name(path);
        let old = format!("{OLD_DIR}/{name}");
        let new = format!("{NEW_DIR}/{name}");
        write_scratch(scratch.path(), &old, original.unwrap_or(""))?;
        write_scratch(scratch.path(), &new, modified)?;

        let output = run_command_with_timeout(self.command(scratch.path(), &old, &new), self.limits)?;
        if output.timed_out {
            return Err(anyhow!(
                "diff timed out after {}s",
                self.limits.timeout.as_secs()
            ));
        }
        if output.truncated() {
            return Err(anyhow!(
                "diff output exceeded {} bytes",
                self.limits.output_limit_bytes
            ));
        }

        match output.exit_code() {
            Some(0) => {
                debug!("no differences");
                Ok(DiffOutcome::Identical)
            }
            Some(1) => {
                let raw = output.stdout_text()?;
                debug!(bytes = raw.len(), "diff computed");
                Ok(DiffOutcome::Changed(raw))
            }
            code => Err(anyhow!(
                "diff exited with {}: {}",
                code.map_or_else(|| "a signal".to_string(), |code| format!("status {code}")),
                output.stderr_lossy()
            )),
        }
    }
}

/// File name used inside the scratch dir; keeps the extension, drops directories.
fn scratch_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty() && name != "..")
        .unwrap_or_else(|| "file".to_string())
}

fn write_scratch(root: &Path, relative: &str, contents: &str) -> Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;

    fn engine(program: DiffProgram) -> ExternalDiffEngine {
        ExternalDiffEngine::new(
            program,
            3,
            ProcessLimits {
                timeout: Duration::from_secs(10),
                output_limit_bytes: 100_000,
            },
        )
    }

    #[test]
    fn identical_texts_report_identical() {
        for program in [DiffProgram::Git, DiffProgram::Diff] {
            let outcome = engine(program)
                .diff("a.txt", Some("same\n"), "same\n")
                .expect("diff");
            assert_eq!(outcome, DiffOutcome::Identical);
        }
    }

    #[test]
    fn changed_texts_produce_a_hunk() {
        for program in [DiffProgram::Git, DiffProgram::Diff] {
            let outcome = engine(program)
                .diff("src/a.txt", Some("one\ntwo\nthree\n"), "one\nTWO\nthree\n")
                .expect("diff");
            let DiffOutcome::Changed(raw) = outcome else {
                panic!("expected a diff for {program:?}");
            };
            assert!(raw.contains("@@ -1,3 +1,3 @@"), "{raw}");
            assert!(raw.contains("-two\n+TWO\n"), "{raw}");
        }
    }

    #[test]
    fn missing_original_diffs_against_empty() {
        let outcome = engine(DiffProgram::Diff)
            .diff("new.txt", None, "hello\n")
            .expect("diff");
        let DiffOutcome::Changed(raw) = outcome else {
            panic!("expected a diff");
        };
        assert!(raw.contains("@@ -0,0 +1 @@"), "{raw}");
    }

    #[test]
    fn scratch_name_never_escapes() {
        assert_eq!(scratch_name("../../etc/passwd"), "passwd");
        assert_eq!(scratch_name("src/lib.rs"), "lib.rs");
        assert_eq!(scratch_name(".."), "file");
    }
}
