//! Pipeline configuration merging.
//!
//! Applies case-specific overrides to the default `patchgen` configuration.

use anyhow::Result;
use patchgen::core::types::PipelineMode;
use patchgen::io::config::PatchgenConfig;

use crate::case::CaseConfig;

/// Apply case configuration overrides to the base pipeline config.
pub fn apply_case_config(
    mut base: PatchgenConfig,
    mode: PipelineMode,
    overrides: &CaseConfig,
) -> Result<PatchgenConfig> {
    base.mode = mode;
    if let Some(require) = overrides.require_context_padding {
        base.validate.require_context_padding = require;
    }
    if let Some(program) = overrides.diff_program {
        base.diff.program = program;
    }
    base.validate()?;
    Ok(base)
}
