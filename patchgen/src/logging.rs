//! Diagnostic tracing for the patchgen CLI.
//!
//! Tracing is for humans debugging a run. The machine-readable record of a
//! run is the JSON report written by `io::report`, which does not depend on
//! `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. Output goes to stderr in compact
/// format so stdout stays reserved for patches and prompts.
///
/// # Example
/// ```bash
/// RUST_LOG=patchgen=debug patchgen run --response answer.txt
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
