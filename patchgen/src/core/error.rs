//! Typed failure taxonomy of the patch pipeline.

use thiserror::Error;

use crate::core::types::ValidationError;

/// Errors surfaced by extraction, synthesis and the strict accept policy.
///
/// Extraction kinds are fatal for the invocation. `DiffComputation` is fatal
/// for one file only. `ValidationFailure` is produced only when a caller opts
/// into rejecting a patch that carries structural errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("could not parse response: {0}")]
    Parse(String),

    #[error("no files or diff could be extracted from the response")]
    EmptyExtraction,

    #[error("response looks like prose or instructions, not structured output")]
    MalformedResponse,

    #[error("diff computation failed for {path}: {reason}")]
    DiffComputation { path: String, reason: String },

    #[error("patch failed validation with {} error(s)", .0.len())]
    ValidationFailure(Vec<ValidationError>),
}

impl PatchError {
    /// Stable code for JSON reports.
    pub fn code(&self) -> &'static str {
        match self {
            PatchError::Parse(_) => "parse_error",
            PatchError::EmptyExtraction => "empty_extraction",
            PatchError::MalformedResponse => "malformed_response",
            PatchError::DiffComputation { .. } => "diff_computation_error",
            PatchError::ValidationFailure(_) => "validation_failure",
        }
    }

    /// True for the kinds raised by the response extractor.
    pub fn is_extraction_failure(&self) -> bool {
        matches!(
            self,
            PatchError::Parse(_) | PatchError::EmptyExtraction | PatchError::MalformedResponse
        )
    }
}
