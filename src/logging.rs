//! Tracing subscriber setup for the CLI.

use tracing_subscriber::EnvFilter;

/// Builds the filter: `RUST_LOG` when set and valid, otherwise `level`.
///
/// An unparseable `level` falls back to `info`.
#[must_use]
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a formatting subscriber that writes to stderr.
///
/// Stdout is left for command output. Calling this twice is harmless; the
/// second call leaves the first subscriber in place.
pub fn init(level: &str) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
