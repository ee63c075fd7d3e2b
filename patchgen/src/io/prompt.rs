//! Prompt rendering for the LLM call that precedes the pipeline.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::core::types::{FileContentMap, PipelineMode};

const TWO_STEP_TEMPLATE: &str = include_str!("prompts/two_step.md");
const DIRECT_TEMPLATE: &str = include_str!("prompts/direct.md");

#[derive(Debug, Clone, Serialize)]
struct FileContext<'a> {
    path: &'a str,
    content: &'a str,
}

/// Everything a prompt is rendered from.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub task: &'a str,
    pub files: &'a FileContentMap,
    /// Messages from a rejected previous attempt.
    pub feedback: &'a [String],
}

/// Renders mode-specific prompts within a byte budget for file contents.
pub struct PromptBuilder {
    env: Environment<'static>,
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("two_step", TWO_STEP_TEMPLATE)
            .context("load two-step prompt template")?;
        env.add_template("direct", DIRECT_TEMPLATE)
            .context("load direct prompt template")?;
        Ok(Self { env, budget_bytes })
    }

    pub fn build(&self, mode: PipelineMode, input: &PromptInputs<'_>) -> Result<String> {
        let (files, omitted) = self.fit_files(input.files);
        let name = match mode {
            PipelineMode::TwoStep => "two_step",
            PipelineMode::Direct => "direct",
        };
        let template = self.env.get_template(name)?;
        let feedback: Vec<&str> = input
            .feedback
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect();
        let rendered = template
            .render(context! {
                task => input.task.trim(),
                files => files,
                omitted => omitted,
                feedback => feedback,
            })
            .with_context(|| format!("render {mode} prompt"))?;
        Ok(rendered)
    }

    /// Keep whole files in path order while they fit; list the rest by path.
    fn fit_files<'a>(&self, files: &'a FileContentMap) -> (Vec<FileContext<'a>>, Vec<&'a str>) {
        let mut used = 0usize;
        let mut included = Vec::new();
        let mut omitted = Vec::new();
        for (path, content) in files {
            if used + content.len() <= self.budget_bytes {
                used += content.len();
                included.push(FileContext { path, content });
            } else {
                debug!(path = %path, bytes = content.len(), "file left out of prompt for budget");
                omitted.push(path.as_str());
            }
        }
        (included, omitted)
    }
}
