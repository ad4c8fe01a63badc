pub mod config;
pub mod error;

pub use config::{parse_duration, Config, LogLevel, ValidationResult};
pub use error::ConfigError;

use anyhow::Result;

/// Semantic version of the build
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Git commit, when provided at build time via `WEATHERD_COMMIT`
pub const COMMIT: &str = match option_env!("WEATHERD_COMMIT") {
    Some(commit) => commit,
    None => "none",
};

/// Initialize tracing/logging.
///
/// `RUST_LOG` takes precedence over the configured level. Library crates
/// only emit events; this is the single place a global subscriber is set.
///
/// # Errors
/// A global subscriber is already installed.
pub fn init_logging(level: LogLevel) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_directive())),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    tracing::debug!("weatherd logging initialized at {}", level.as_directive());
    Ok(())
}
