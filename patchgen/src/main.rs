//! `patchgen` CLI.
//!
//! Renders prompts for an LLM, and turns its responses into validated
//! unified-diff patches against a local repository.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use patchgen::core::extract::{ExtractMode, ExtractedPayload};
use patchgen::core::types::PipelineMode;
use patchgen::exit_codes;
use patchgen::io::config::{CONFIG_FILE_NAME, PatchgenConfig, load_config, write_config};
use patchgen::io::prompt::{PromptBuilder, PromptInputs};
use patchgen::io::repo::load_snapshot;
use patchgen::io::report::read_report;
use patchgen::logging;
use patchgen::run::{RunOptions, run_pipeline};

#[derive(Parser)]
#[command(
    name = "patchgen",
    version,
    about = "Turn LLM responses into unified-diff patches that apply"
)]
struct Cli {
    /// Repository root the patch targets.
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Config file (default: `<repo>/.patchgen.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    TwoStep,
    Direct,
}

impl From<ModeArg> for PipelineMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::TwoStep => PipelineMode::TwoStep,
            ModeArg::Direct => PipelineMode::Direct,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Write a default `.patchgen.toml`.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the prompt to send to the LLM.
    Prompt {
        /// Task description.
        #[arg(long)]
        task: String,
        /// Repository files to include (repeatable).
        #[arg(long = "file")]
        files: Vec<String>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// JSON report of a rejected attempt to feed back to the model.
        #[arg(long)]
        feedback: Option<PathBuf>,
    },
    /// Print the files or diff extracted from a response.
    Extract {
        /// Response file, or `-` for stdin.
        #[arg(long)]
        response: String,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Check a unified diff for structural errors.
    Validate {
        /// Patch file, or `-` for stdin.
        patch: String,
    },
    /// Run the full pipeline on a response.
    Run {
        /// Response file, or `-` for stdin.
        #[arg(long)]
        response: String,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Write the patch here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Write a JSON run report here.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Dry-run `git apply --check` in the repository.
        #[arg(long)]
        check_apply: bool,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.repo.join(CONFIG_FILE_NAME));

    match cli.command {
        Command::Init { force } => cmd_init(&config_path, force),
        Command::Prompt {
            task,
            files,
            mode,
            feedback,
        } => {
            let config = load_config(&config_path)?;
            cmd_prompt(&config, &cli.repo, &task, &files, mode, feedback.as_deref())
        }
        Command::Extract { response, mode } => {
            let config = load_config(&config_path)?;
            cmd_extract(&config, &response, mode)
        }
        Command::Validate { patch } => {
            let config = load_config(&config_path)?;
            cmd_validate(&config, &patch)
        }
        Command::Run {
            response,
            mode,
            out,
            report,
            check_apply,
        } => {
            let config = load_config(&config_path)?;
            let opts = RunOptions {
                repo: cli.repo.clone(),
                mode: resolve_mode(&config, mode),
                response: read_input(&response)?,
                out,
                report,
                check_apply,
            };
            cmd_run(&config, &opts)
        }
    }
}

fn resolve_mode(config: &PatchgenConfig, mode: Option<ModeArg>) -> PipelineMode {
    mode.map(PipelineMode::from).unwrap_or(config.mode)
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    write_config(config_path, &PatchgenConfig::default())?;
    println!("wrote {}", config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_prompt(
    config: &PatchgenConfig,
    repo: &Path,
    task: &str,
    files: &[String],
    mode: Option<ModeArg>,
    feedback: Option<&Path>,
) -> Result<i32> {
    let snapshot = load_snapshot(repo, files)?;
    let feedback = match feedback {
        Some(path) => read_report(path)?.feedback_lines(),
        None => Vec::new(),
    };
    let prompt = PromptBuilder::new(config.prompt.budget_bytes)?.build(
        resolve_mode(config, mode),
        &PromptInputs {
            task,
            files: &snapshot,
            feedback: &feedback,
        },
    )?;
    print!("{prompt}");
    Ok(exit_codes::OK)
}

fn cmd_extract(config: &PatchgenConfig, response: &str, mode: Option<ModeArg>) -> Result<i32> {
    let raw = read_input(response)?;
    let mode = ExtractMode::from(resolve_mode(config, mode));
    match config.extractor()?.extract(&raw, mode) {
        Ok(ExtractedPayload::StructuredFiles(files)) => {
            for (path, content) in files.iter() {
                print!("FILE: {path}\n{content}---\n");
            }
            Ok(exit_codes::OK)
        }
        Ok(ExtractedPayload::RawText(text)) => {
            print!("{text}");
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("extraction failed ({}): {err}", err.code());
            Ok(exit_codes::EXTRACTION_FAILED)
        }
    }
}

fn cmd_validate(config: &PatchgenConfig, patch: &str) -> Result<i32> {
    let text = read_input(patch)?;
    let report = config.validator().validate(&text);
    if report.valid() {
        println!("patch is valid ({} hunk(s))", report.hunks.len());
        return Ok(exit_codes::OK);
    }
    println!("patch is invalid ({} error(s)):", report.errors.len());
    for err in &report.errors {
        println!("- {}", err.message);
    }
    Ok(exit_codes::PATCH_INVALID)
}

fn cmd_run(config: &PatchgenConfig, opts: &RunOptions) -> Result<i32> {
    let summary = run_pipeline(config, opts)?;
    let report = &summary.report;

    if let Some(err) = &report.extraction_error {
        eprintln!("extraction failed ({}): {}", err.code, err.message);
        return Ok(summary.exit_code);
    }

    if opts.out.is_none()
        && let Some(patch) = &summary.patch_text
    {
        print!("{patch}");
    }
    for note in &report.notes {
        eprintln!("note: {}", serde_json::to_string(note).context("serialize note")?);
    }
    for err in &report.errors {
        eprintln!("error: {}", err.message);
    }
    for failure in &report.failures {
        eprintln!("error: {}", failure.message);
    }
    if let Some(check) = &report.apply_check
        && !check.applies
    {
        eprintln!("error: git apply --check failed: {}", check.stderr);
    }
    Ok(summary.exit_code)
}

/// Read a file argument, with `-` meaning stdin.
fn read_input(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(arg).with_context(|| format!("read {arg}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["patchgen", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
        assert_eq!(cli.repo, PathBuf::from("."));
    }

    #[test]
    fn parse_run_with_global_flags() {
        let cli = Cli::parse_from([
            "patchgen",
            "run",
            "--response",
            "answer.txt",
            "--mode",
            "direct",
            "--repo",
            "/tmp/repo",
            "--check-apply",
        ]);
        assert_eq!(cli.repo, PathBuf::from("/tmp/repo"));
        match cli.command {
            Command::Run {
                response,
                mode,
                check_apply,
                ..
            } => {
                assert_eq!(response, "answer.txt");
                assert_eq!(mode, Some(ModeArg::Direct));
                assert!(check_apply);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn parse_prompt_repeats_files() {
        let cli = Cli::parse_from([
            "patchgen", "prompt", "--task", "t", "--file", "a.rs", "--file", "b.rs",
        ]);
        match cli.command {
            Command::Prompt { files, mode, .. } => {
                assert_eq!(files, vec!["a.rs".to_string(), "b.rs".to_string()]);
                assert_eq!(mode, None);
            }
            _ => panic!("expected prompt"),
        }
    }

    #[test]
    fn mode_flag_overrides_config() {
        let config = PatchgenConfig::default();
        assert_eq!(resolve_mode(&config, None), PipelineMode::TwoStep);
        assert_eq!(
            resolve_mode(&config, Some(ModeArg::Direct)),
            PipelineMode::Direct
        );
    }
}
