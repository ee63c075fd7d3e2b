//! Turn free-form LLM responses into unified-diff patches that apply.
//!
//! A response either carries full replacement files (`FILE: <path>` blocks)
//! or a unified diff. The pipeline extracts the payload, synthesizes or
//! validates the diff and reports every structural problem it finds. The
//! crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (extraction, diff grammar,
//!   header rewriting, structural validation). No I/O.
//! - **[`io`]**: Side-effecting operations (config, repository snapshots,
//!   external diff processes, git, prompts, reports).
//!
//! Orchestration modules ([`synthesize`], [`pipeline`], [`run`]) combine the
//! two to implement CLI commands.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod run;
pub mod synthesize;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
