//! Logging setup for the valve server
//!
//! Builds a `tracing` subscriber from the environment. The server runs in
//! the foreground on a lab host, so everything goes to stderr; `RUST_LOG`
//! overrides the default filter.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level when RUST_LOG is unset
    pub level: Level,

    /// Include target module paths in output
    pub targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            targets: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(rust_log) = std::env::var("RUST_LOG") {
            if rust_log.contains("trace") {
                config.level = Level::TRACE;
            } else if rust_log.contains("debug") {
                config.level = Level::DEBUG;
            } else if rust_log.contains("warn") {
                config.level = Level::WARN;
            } else if rust_log.contains("error") {
                config.level = Level::ERROR;
            }
        }
        config
    }

    /// Raise the default level for a `--verbose` flag
    pub fn verbose(mut self) -> Self {
        self.level = Level::DEBUG;
        self
    }
}

/// Initialize the global tracing subscriber
///
/// Returns an error if a subscriber is already installed, which only
/// happens when called twice (e.g. from tests).
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vici_valve_rust={}", config.level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.targets)
        .with_writer(std::io::stderr)
        .try_init()?;

    Ok(())
}
