//! Tracing subscriber setup for the binary.

use crate::domain::config_validation::DEFAULT_LOG_LEVEL;
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG` if set, else `level`, else `info`.
pub fn filter_for(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or(DEFAULT_LOG_LEVEL)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// Install the global subscriber, writing to stderr. Later calls are no-ops.
pub fn init(level: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
