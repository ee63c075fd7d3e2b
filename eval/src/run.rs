//! Case execution orchestration.
//!
//! Coordinates workspace creation, the pipeline replay, checks and result
//! capture.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use patchgen::io::config::PatchgenConfig;
use patchgen::run::{RunOptions, run_pipeline};

use crate::case::CaseFile;
use crate::config::apply_case_config;
use crate::judge::{Judgment, run_checks, write_judgment};
use crate::outcome::{Outcome, classify_outcome};
use crate::results::{CaptureInput, capture_results, results_dir, update_outcome};
use crate::workspace::create_workspace;

/// Result of running a single case.
#[derive(Debug)]
pub struct RunOutcome {
    /// Unique identifier for this eval run.
    pub eval_run_id: String,
    /// Path to the results directory.
    pub results_dir: PathBuf,
    /// Classified outcome.
    pub outcome: Outcome,
}

pub fn new_eval_run_id() -> String {
    format!("eval-{}", Utc::now().format("%Y%m%d_%H%M%S_%3f"))
}

/// Run a case end-to-end: workspace creation, pipeline replay, checks, result capture.
#[instrument(skip_all, fields(case_id = %case.case.id))]
pub fn run_case(repo_root: &Path, case_path: &Path, case: &CaseFile) -> Result<RunOutcome> {
    info!("case run started");
    let eval_dir = repo_root.join("eval");

    debug!("creating workspace");
    let workspace = create_workspace(&eval_dir.join("workspaces"), &case.case.id, &case.files)
        .context("create workspace")?;

    let config = apply_case_config(PatchgenConfig::default(), case.case.mode, &case.config)?;

    let eval_run_id = new_eval_run_id();
    let results_dir = results_dir(&eval_dir.join("results"), &case.case.id, &eval_run_id);
    fs::create_dir_all(&results_dir)
        .with_context(|| format!("create results dir {}", results_dir.display()))?;
    fs::write(results_dir.join("response.md"), &case.case.response)
        .context("write response copy")?;

    let opts = RunOptions {
        repo: workspace.root.clone(),
        mode: case.case.mode,
        response: case.case.response.clone(),
        out: Some(results_dir.join("patch.diff")),
        report: Some(results_dir.join("report.json")),
        check_apply: true,
    };

    let started_at = Utc::now();
    let run = run_pipeline(&config, &opts);
    let finished_at = Utc::now();

    let mut errors = Vec::new();
    let (exit_code, judgment) = match run {
        Ok(summary) => {
            debug!(exit_code = summary.exit_code, "pipeline finished");
            (
                Some(summary.exit_code),
                run_checks(&case.checks, &summary.report),
            )
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "pipeline did not produce a report");
            errors.push(format!("pipeline: {err:#}"));
            (None, Judgment { checks: Vec::new() })
        }
    };

    let capture_input = CaptureInput {
        case_id: &case.case.id,
        case_path,
        eval_run_id: &eval_run_id,
        mode: case.case.mode,
        exit_code,
        started_at,
        finished_at,
        workspace_root: &workspace.root,
        repo_root,
    };
    capture_results(&results_dir, &capture_input, errors).context("capture results")?;
    write_judgment(&results_dir.join("checks.json"), &judgment).context("write checks")?;

    let outcome = classify_outcome(exit_code, &judgment);
    update_outcome(&results_dir, outcome).context("update outcome")?;

    info!(outcome = ?outcome, results_dir = %results_dir.display(), "case run complete");

    Ok(RunOutcome {
        eval_run_id,
        results_dir,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::CheckOutcome;
    use tempfile::tempdir;

    #[test]
    fn eval_run_id_format() {
        let id = new_eval_run_id();
        assert!(id.starts_with("eval-"));
        assert_eq!(id.len(), "eval-20260101_120000_000".len());
    }

    fn write_case(dir: &Path, contents: &str) -> (PathBuf, CaseFile) {
        let path = dir.join("case.toml");
        fs::write(&path, contents).expect("write case");
        let case = CaseFile::load(&path).expect("load case");
        (path, case)
    }

    #[test]
    fn two_step_case_runs_end_to_end() {
        let temp = tempdir().expect("tempdir");
        let (case_path, case) = write_case(
            temp.path(),
            r#"
[case]
id = "greeting"
response = """
Here you go:

```
FILE: hello.txt
hello, world
---
```
"""

[files]
"hello.txt" = "hello\n"

[[checks]]
type = "patch_valid"

[[checks]]
type = "file_diff"
path = "hello.txt"
creation = false

[[checks]]
type = "patch_applies"
"#,
        );

        let run = run_case(temp.path(), &case_path, &case).expect("run case");

        assert_eq!(run.outcome, Outcome::Success);
        assert!(run.results_dir.join("patch.diff").exists());
        assert!(run.results_dir.join("report.json").exists());
        assert!(run.results_dir.join("meta.json").exists());
        let judgment: Judgment = serde_json::from_str(
            &fs::read_to_string(run.results_dir.join("checks.json")).expect("checks"),
        )
        .expect("parse checks");
        assert!(judgment.all_passed());
    }

    #[test]
    fn failed_expectation_is_a_fail_outcome() {
        let temp = tempdir().expect("tempdir");
        let (case_path, case) = write_case(
            temp.path(),
            r#"
[case]
id = "prose"
response = "1. open the file\n2. rename the function\n"

[[checks]]
type = "patch_valid"
"#,
        );

        let run = run_case(temp.path(), &case_path, &case).expect("run case");

        assert_eq!(run.outcome, Outcome::Fail);
        let judgment: Judgment = serde_json::from_str(
            &fs::read_to_string(run.results_dir.join("checks.json")).expect("checks"),
        )
        .expect("parse checks");
        assert!(matches!(
            judgment.checks[0],
            CheckOutcome::PatchValid { passed: false, .. }
        ));
    }
}
