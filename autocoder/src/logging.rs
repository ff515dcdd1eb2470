//! Development-time tracing for debugging the coder.
//!
//! Tracing is dev diagnostics only, controlled via `RUST_LOG` and written to
//! stderr. Product output (the status document, the end-of-run summary) is
//! produced independently and is unaffected by the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber for development logging.
///
/// Reads `RUST_LOG`, defaulting to `warn` when unset. Output goes to stderr
/// in compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=autocoder=debug autocoder run --task "print Hello, World!"
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
