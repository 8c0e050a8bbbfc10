//! Tracing subscriber bootstrap.
//!
//! Library code only emits `tracing` events. Binaries and test harnesses
//! call `init_tracing` once to route them to stderr.

use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` (e.g. "info",
/// "ragstore_vector=debug") is used as the filter directive. Fails if a
/// global subscriber is already installed.
pub fn init_tracing(level: &str) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ConfigError::Telemetry(e.to_string()))
}
