//! End-to-end pipeline scenarios against a real git repository.
//!
//! Each scenario runs the external diff engine, then checks the produced
//! patch with `git apply --check` in the same repository.

use patchgen::core::types::PipelineMode;
use patchgen::io::config::PatchgenConfig;
use patchgen::io::git::Git;
use patchgen::io::repo::load_snapshot;
use patchgen::io::report::write_patch;
use patchgen::pipeline::{Pipeline, PipelineOutcome};
use patchgen::synthesize::SynthesisNote;
use patchgen::test_support::TestRepo;

fn run(repo: &TestRepo, mode: PipelineMode, paths: &[&str], response: &str) -> PipelineOutcome {
    let config = PatchgenConfig::default();
    let pipeline = Pipeline::from_config(&config).expect("pipeline");
    let paths: Vec<String> = paths.iter().map(|path| path.to_string()).collect();
    let original = load_snapshot(repo.path(), &paths).expect("snapshot");
    pipeline.run(mode, &original, response).expect("pipeline run")
}

fn assert_applies(repo: &TestRepo, patch_text: &str) {
    let scratch = tempfile::tempdir().expect("tempdir");
    let patch_path = scratch.path().join("change.patch");
    write_patch(&patch_path, patch_text).expect("write patch");
    let check = Git::new(repo.path())
        .apply_check(&patch_path)
        .expect("apply check");
    assert!(check.applies, "{}\n---\n{patch_text}", check.stderr);
}

#[test]
fn two_step_edit_produces_applicable_patch() {
    let repo = TestRepo::with_files(&[(
        "src/lib.rs",
        "pub fn one() -> u32 {\n    1\n}\n\npub fn two() -> u32 {\n    2\n}\n",
    )])
    .expect("repo");
    let response = "Here is the updated file.\n\n```\nFILE: src/lib.rs\npub fn one() -> u32 {\n    1\n}\n\npub fn two() -> u32 {\n    22\n}\n---\n```\n";

    let outcome = run(&repo, PipelineMode::TwoStep, &["src/lib.rs"], response);

    assert!(outcome.is_clean(), "{:?} {:?}", outcome.errors, outcome.failures);
    assert!(outcome.patch_text.starts_with("diff --git a/src/lib.rs b/src/lib.rs\n"));
    assert!(outcome.patch_text.contains("-    2\n+    22\n"));
    assert_eq!(outcome.files.len(), 1);
    assert_eq!((outcome.files[0].added, outcome.files[0].removed), (1, 1));
    assert_applies(&repo, &outcome.patch_text);
}

#[test]
fn two_step_creation_and_edit_in_one_patch() {
    let repo = TestRepo::with_files(&[("README.md", "# demo\n")]).expect("repo");
    let response = "FILE: docs/guide.md\n# Guide\n\nStart here.\n---\nFILE: README.md\n# demo\n\nSee docs/guide.md.\n---\n";

    let outcome = run(
        &repo,
        PipelineMode::TwoStep,
        &["docs/guide.md", "README.md"],
        response,
    );

    assert!(outcome.is_clean(), "{:?} {:?}", outcome.errors, outcome.failures);
    let guide = outcome
        .patch_text
        .find("+++ b/docs/guide.md")
        .expect("guide section");
    let readme = outcome
        .patch_text
        .find("+++ b/README.md")
        .expect("readme section");
    assert!(guide < readme, "response order is kept");
    assert!(outcome.patch_text.contains("--- /dev/null\n+++ b/docs/guide.md\n"));
    assert!(outcome.files[0].creation);
    assert_applies(&repo, &outcome.patch_text);
}

#[test]
fn two_step_resolves_path_case() {
    let repo = TestRepo::with_files(&[("Config.toml", "name = \"a\"\n")]).expect("repo");
    let response = "FILE: config.toml\nname = \"b\"\n---\n";

    let outcome = run(&repo, PipelineMode::TwoStep, &["config.toml"], response);

    assert!(outcome.is_clean(), "{:?}", outcome.failures);
    assert!(outcome.patch_text.contains("+++ b/Config.toml\n"));
    assert!(outcome.notes.iter().any(|note| matches!(
        note,
        SynthesisNote::CaseResolved { resolved, .. } if resolved == "Config.toml"
    )));
    assert_applies(&repo, &outcome.patch_text);
}

#[test]
fn two_step_crlf_response_matches_lf_repo() {
    let repo = TestRepo::with_files(&[("a.txt", "one\ntwo\n")]).expect("repo");
    let response = "FILE: a.txt\r\none\r\ntwo\r\n---\r\n";

    let outcome = run(&repo, PipelineMode::TwoStep, &["a.txt"], response);

    assert!(outcome.is_empty());
    assert!(outcome.is_clean());
    assert_eq!(
        outcome.notes,
        vec![SynthesisNote::Unchanged {
            path: "a.txt".to_string()
        }]
    );
}

#[test]
fn direct_mode_accepts_model_diff_that_applies() {
    let repo =
        TestRepo::with_files(&[("notes.txt", "alpha\nbeta\ngamma\ndelta\n")]).expect("repo");
    let response = "Apply this:\n\n```diff\n--- a/notes.txt\n+++ b/notes.txt\n@@ -1,4 +1,4 @@\n alpha\n-beta\n+BETA\n gamma\n delta\n```\n";

    let outcome = run(&repo, PipelineMode::Direct, &["notes.txt"], response);

    assert!(outcome.is_clean(), "{:?}", outcome.errors);
    assert_applies(&repo, &outcome.patch_text);
}

#[test]
fn direct_mode_reports_miscounted_hunk() {
    let repo = TestRepo::with_files(&[("notes.txt", "alpha\nbeta\ngamma\n")]).expect("repo");
    let response = "--- a/notes.txt\n+++ b/notes.txt\n@@ -1,4 +1,4 @@\n alpha\n-beta\n+BETA\n gamma\n";

    let outcome = run(&repo, PipelineMode::Direct, &["notes.txt"], response);

    assert!(!outcome.is_clean());
    assert!(
        outcome
            .errors
            .iter()
            .any(|err| err.message.contains("old line count mismatch")),
        "{:?}",
        outcome.errors
    );
    assert!(outcome.accept().is_err());
}
