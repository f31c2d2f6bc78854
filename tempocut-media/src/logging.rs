//! Structured logging configuration.
//!
//! Initializes a `tracing` subscriber with:
//! - `RUST_LOG` environment filter support
//! - Default level: INFO for the tempocut crates
//! - Output to stderr (stdout stays clean for piping)

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Call once at program startup. Safe to call multiple times — subsequent
/// calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tempocut_core=info,tempocut_media=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
