//! Tracing and logging support.
//!
//! Logs go to stderr so `webplug get` output on stdout stays clean.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tracing output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TracingFormat {
    /// Human-readable multi-line output.
    Pretty,

    /// One line per event.
    Compact,

    /// JSON lines (recommended for production).
    Json,
}

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level filter.
    ///
    /// If None, uses RUST_LOG environment variable or defaults to "info".
    pub level: Option<tracing::Level>,

    pub format: TracingFormat,

    pub timestamps: bool,

    /// Include target module names in output.
    pub target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: TracingFormat::Compact,
            timestamps: true,
            target: false,
        }
    }
}

impl TracingConfig {
    fn filter(&self) -> EnvFilter {
        match self.level {
            Some(level) => EnvFilter::new(level.to_string()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        }
    }
}

/// Initialize the global subscriber.
///
/// # Environment Variables
///
/// - `RUST_LOG=debug` - Enable debug logs
/// - `RUST_LOG=webplug_host=trace` - Per-crate filtering
pub fn init_subscriber_with_config(config: TracingConfig) {
    let filter = config.filter();
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.target);

    match (config.format, config.timestamps) {
        (TracingFormat::Pretty, true) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.pretty())
                .init();
        }
        (TracingFormat::Pretty, false) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.pretty().without_time())
                .init();
        }
        (TracingFormat::Compact, true) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.compact())
                .init();
        }
        (TracingFormat::Compact, false) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.compact().without_time())
                .init();
        }
        (TracingFormat::Json, true) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .init();
        }
        (TracingFormat::Json, false) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.json().without_time())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.format, TracingFormat::Compact);
        assert!(config.timestamps);
        assert!(!config.target);
        assert!(config.level.is_none());
    }

    #[test]
    fn test_explicit_level_overrides_env() {
        let config = TracingConfig {
            level: Some(tracing::Level::DEBUG),
            ..Default::default()
        };
        assert_eq!(config.filter().to_string(), "debug");
    }
}
