//! Pipeline configuration stored in `.patchgen.toml` at the repository root.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::extract::Extractor;
use crate::core::types::PipelineMode;
use crate::core::validator::Validator;
use crate::io::process::ProcessLimits;

pub const CONFIG_FILE_NAME: &str = ".patchgen.toml";

/// Pipeline configuration (TOML).
///
/// Every table is optional; missing fields fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PatchgenConfig {
    /// Mode used when the CLI is not given `--mode`.
    pub mode: PipelineMode,
    pub diff: DiffConfig,
    pub extract: ExtractConfig,
    pub validate: ValidateConfig,
    pub prompt: PromptConfig,
}

/// External program used to compute line diffs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiffProgram {
    #[default]
    Git,
    Diff,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiffConfig {
    pub program: DiffProgram,
    /// Lines of context around each change (`-U<n>`).
    pub context_lines: u32,
    pub timeout_secs: u64,
    /// Diff output beyond this many bytes is treated as a failure.
    pub output_limit_bytes: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            program: DiffProgram::Git,
            context_lines: 3,
            timeout_secs: 30,
            output_limit_bytes: 2_000_000,
        }
    }
}

impl DiffConfig {
    pub fn limits(&self) -> ProcessLimits {
        ProcessLimits {
            timeout: Duration::from_secs(self.timeout_secs),
            output_limit_bytes: self.output_limit_bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ExtractConfig {
    /// Extra artifact-marker regexes; anchor them with `^` yourself.
    pub extra_artifact_markers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidateConfig {
    pub require_context_padding: bool,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            require_context_padding: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PromptConfig {
    /// Upper bound on original-file bytes embedded in a prompt.
    pub budget_bytes: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            budget_bytes: 60_000,
        }
    }
}

impl PatchgenConfig {
    pub fn validate(&self) -> Result<()> {
        if self.diff.timeout_secs == 0 {
            return Err(anyhow!("diff.timeout_secs must be > 0"));
        }
        if self.diff.output_limit_bytes == 0 {
            return Err(anyhow!("diff.output_limit_bytes must be > 0"));
        }
        if self.diff.context_lines > 100 {
            return Err(anyhow!("diff.context_lines must be <= 100"));
        }
        if self.prompt.budget_bytes == 0 {
            return Err(anyhow!("prompt.budget_bytes must be > 0"));
        }
        self.extractor().map(|_| ())
    }

    /// Extractor carrying the configured extra artifact markers.
    pub fn extractor(&self) -> Result<Extractor> {
        Extractor::with_extra_markers(&self.extract.extra_artifact_markers)
            .map_err(|err| anyhow!("extract.extra_artifact_markers: {err}"))
    }

    pub fn validator(&self) -> Validator {
        Validator::new(self.validate.require_context_padding)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PatchgenConfig::default()`.
pub fn load_config(path: &Path) -> Result<PatchgenConfig> {
    if !path.exists() {
        return Ok(PatchgenConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PatchgenConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PatchgenConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
    crate::io::report::write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, PatchgenConfig::default());
        assert_eq!(cfg.mode, PipelineMode::TwoStep);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        let mut cfg = PatchgenConfig::default();
        cfg.mode = PipelineMode::Direct;
        cfg.diff.program = DiffProgram::Diff;
        cfg.extract.extra_artifact_markers = vec!["^npm ERR!".to_string()];
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "mode = \"direct\"\n[validate]\nrequire_context_padding = false\n")
            .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.mode, PipelineMode::Direct);
        assert!(!cfg.validate.require_context_padding);
        assert_eq!(cfg.diff, DiffConfig::default());
    }

    #[test]
    fn rejects_invalid_values() {
        let mut cfg = PatchgenConfig::default();
        cfg.diff.timeout_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = PatchgenConfig::default();
        cfg.extract.extra_artifact_markers = vec!["(".to_string()];
        let err = cfg.validate().expect_err("bad regex");
        assert!(format!("{err:#}").contains("extra_artifact_markers"));
    }
}
