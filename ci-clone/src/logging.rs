//! Diagnostic tracing for the clone engine.
//!
//! Two output channels, kept apart:
//!
//! - **Tracing (this module)**: diagnostics via `RUST_LOG`, written to stderr.
//! - **Build log (stdout)**: `+ git ...` trace lines, relayed tool output and
//!   retry notices. Always printed, unaffected by `RUST_LOG`.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; unset or unparsable directives fall back to `warn`.
/// Output: stderr, compact format, no ANSI when stderr is not a terminal.
///
/// # Example
/// ```bash
/// RUST_LOG=ci_clone=debug ci-clone --remote https://github.com/octocat/hello-world.git
/// ```
pub fn init() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
                .compact(),
        )
        .init();
}
