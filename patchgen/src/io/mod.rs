//! Side-effecting helpers: files, subprocesses, git and templates.

pub mod config;
pub mod differ;
pub mod git;
pub mod process;
pub mod prompt;
pub mod repo;
pub mod report;
