//! CLI tests for the `patchgen` binary.
//!
//! Spawns the binary and checks exit codes and the files it writes.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use patchgen::exit_codes;
use patchgen::io::config::CONFIG_FILE_NAME;
use patchgen::io::report::read_report;
use patchgen::test_support::TestRepo;

fn patchgen(repo: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_patchgen"))
        .arg("--repo")
        .arg(repo)
        .args(args)
        .output()
        .expect("spawn patchgen")
}

fn patchgen_stdin(repo: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_patchgen"))
        .arg("--repo")
        .arg(repo)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn patchgen");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait patchgen")
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let temp = tempfile::tempdir().expect("tempdir");

    let first = patchgen(temp.path(), &["init"]);
    assert_eq!(first.status.code(), Some(exit_codes::OK));
    let config = fs::read_to_string(temp.path().join(CONFIG_FILE_NAME)).expect("config");
    assert!(config.contains("mode = \"two-step\""));

    let second = patchgen(temp.path(), &["init"]);
    assert_eq!(second.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&second.stderr).contains("--force"));

    let forced = patchgen(temp.path(), &["init", "--force"]);
    assert_eq!(forced.status.code(), Some(exit_codes::OK));
}

#[test]
fn validate_exit_codes_follow_patch_validity() {
    let temp = tempfile::tempdir().expect("tempdir");
    let good = "--- a/a.txt\n+++ b/a.txt\n@@ -1,3 +1,3 @@\n one\n-two\n+TWO\n three\n";
    let bad = "--- a/a.txt\n+++ b/a.txt\n@@ -1,3 +1,3 @@\n one\n-two\n+TWO\n";

    let ok = patchgen_stdin(temp.path(), &["validate", "-"], good);
    assert_eq!(ok.status.code(), Some(exit_codes::OK));

    let invalid = patchgen_stdin(temp.path(), &["validate", "-"], bad);
    assert_eq!(invalid.status.code(), Some(exit_codes::PATCH_INVALID));
    assert!(String::from_utf8_lossy(&invalid.stdout).contains("line count mismatch"));
}

#[test]
fn extract_prints_file_blocks_or_fails_with_extraction_code() {
    let temp = tempfile::tempdir().expect("tempdir");

    let ok = patchgen_stdin(
        temp.path(),
        &["extract", "--response", "-"],
        "```\nFILE: a.txt\nhello\n---\n```\n",
    );
    assert_eq!(ok.status.code(), Some(exit_codes::OK));
    assert_eq!(String::from_utf8_lossy(&ok.stdout), "FILE: a.txt\nhello\n---\n");

    let failed = patchgen_stdin(
        temp.path(),
        &["extract", "--response", "-"],
        "I would change the greeting.\n",
    );
    assert_eq!(failed.status.code(), Some(exit_codes::EXTRACTION_FAILED));
}

#[test]
fn run_writes_patch_and_report() {
    let repo = TestRepo::with_files(&[("a.txt", "one\ntwo\nthree\n")]).expect("repo");
    let response = repo.path().join("response.md");
    fs::write(&response, "FILE: a.txt\none\n2\nthree\n---\n").expect("write response");
    let out = repo.path().join("out/fix.patch");
    let report = repo.path().join("out/report.json");

    let output = patchgen(
        repo.path(),
        &[
            "run",
            "--response",
            response.to_str().expect("utf-8 path"),
            "--out",
            out.to_str().expect("utf-8 path"),
            "--report",
            report.to_str().expect("utf-8 path"),
            "--check-apply",
        ],
    );

    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let patch = fs::read_to_string(&out).expect("patch");
    assert!(patch.contains("-two\n+2\n"));
    let report = read_report(&report).expect("report");
    assert!(report.valid);
    assert!(report.apply_check.is_some_and(|check| check.applies));
    assert_eq!(repo.read("a.txt").expect("read"), "one\ntwo\nthree\n");
}

#[test]
fn run_without_changes_exits_no_changes() {
    let repo = TestRepo::with_files(&[("a.txt", "same\n")]).expect("repo");

    let output = patchgen_stdin(
        repo.path(),
        &["run", "--response", "-"],
        "FILE: a.txt\nsame\n---\n",
    );

    assert_eq!(output.status.code(), Some(exit_codes::NO_CHANGES));
    assert!(output.stdout.is_empty());
}

#[test]
fn prompt_includes_requested_files_and_feedback() {
    let repo = TestRepo::with_files(&[("src/main.rs", "fn main() {}\n")]).expect("repo");
    let feedback = repo.path().join("previous.json");
    fs::write(
        &feedback,
        r#"{"mode":"direct","valid":false,"errors":[{"hunk":1,"message":"Hunk 1: old line count mismatch"}]}"#,
    )
    .expect("write feedback");

    let output = patchgen(
        repo.path(),
        &[
            "prompt",
            "--task",
            "print hello",
            "--file",
            "src/main.rs",
            "--mode",
            "direct",
            "--feedback",
            feedback.to_str().expect("utf-8 path"),
        ],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let prompt = String::from_utf8_lossy(&output.stdout);
    assert!(prompt.contains("<file path=\"src/main.rs\">\nfn main() {}\n</file>"));
    assert!(prompt.contains("- Hunk 1: old line count mismatch"));
}
