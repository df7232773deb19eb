//! Structured logging for the hybrid search core
//! JSON or pretty-printed logging with configurable levels and span tracing

use std::io;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    EnvFilter, Layer, Registry,
};

/// Logging configuration
#[derive(Clone, Debug)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON format (default: true for production)
    pub json_format: bool,

    /// Enable span events (default: true)
    pub log_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            log_spans: true,
        }
    }
}

impl LogConfig {
    /// JSON, INFO level.
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            log_spans: true,
        }
    }

    /// Pretty, DEBUG level.
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            log_spans: true,
        }
    }
}

/// Initialize structured logging with the given configuration
pub fn init_logging(config: LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.level).or_else(|_| EnvFilter::try_new("info"))?;

    let span_events = if config.log_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_current_span(true)
            .with_target(true)
            .with_writer(io::stdout);

        let subscriber = Registry::default().with(filter).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let fmt_layer = fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_target(true)
            .with_writer(io::stdout);

        let subscriber = Registry::default().with(filter).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

/// Initialize logging from `RUST_LOG` (format defaults to JSON).
pub fn init_from_env() -> anyhow::Result<()> {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    init_logging(LogConfig {
        level,
        json_format: true,
        log_spans: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.json_format);
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert_eq!(config.level, "debug");
        assert!(!config.json_format);
    }
}
