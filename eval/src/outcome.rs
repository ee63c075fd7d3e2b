use serde::{Deserialize, Serialize};

use patchgen::exit_codes;

use crate::judge::Judgment;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Fail,
    Error,
}

/// `exit_code` is `None` when the pipeline never produced a report.
pub fn classify_outcome(exit_code: Option<i32>, judgment: &Judgment) -> Outcome {
    match exit_code {
        None | Some(exit_codes::INVALID) => Outcome::Error,
        Some(_) if judgment.all_passed() => Outcome::Success,
        Some(_) => Outcome::Fail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::CheckOutcome;

    fn judgment(pass: bool) -> Judgment {
        Judgment {
            checks: vec![CheckOutcome::PatchValid {
                passed: pass,
                errors: 0,
            }],
        }
    }

    #[test]
    fn success_when_checks_pass() {
        let outcome = classify_outcome(Some(exit_codes::OK), &judgment(true));
        assert_eq!(outcome, Outcome::Success);
    }

    #[test]
    fn expected_failures_still_count_as_success() {
        let outcome = classify_outcome(Some(exit_codes::EXTRACTION_FAILED), &judgment(true));
        assert_eq!(outcome, Outcome::Success);
        let outcome = classify_outcome(Some(exit_codes::PATCH_INVALID), &judgment(true));
        assert_eq!(outcome, Outcome::Success);
    }

    #[test]
    fn fail_when_checks_fail() {
        let outcome = classify_outcome(Some(exit_codes::OK), &judgment(false));
        assert_eq!(outcome, Outcome::Fail);
    }

    #[test]
    fn error_when_pipeline_did_not_report() {
        assert_eq!(classify_outcome(None, &judgment(true)), Outcome::Error);
        assert_eq!(
            classify_outcome(Some(exit_codes::INVALID), &judgment(true)),
            Outcome::Error
        );
    }
}
