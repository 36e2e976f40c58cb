use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Initializes the global tracing subscriber from the logging section of the
/// module options. An invalid level is a configuration error and panics, the
/// same way a missing required endpoint would fail at its point of use.
pub fn init_logging(logging_config: &LoggingConfig) {
    // Parse level string -> LevelFilter
    let level_filter = match logging_config.level.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => {
            panic!(
                "Invalid logging.level '{}'. Valid values: trace, debug, info, warn, error",
                logging_config.level
            );
        }
    };

    // Env-based overrides still apply on top of the configured default.
    let filter_layer = EnvFilter::default().add_directive(level_filter.into());

    // Bridge legacy `log` records; ignore the error if a logger is already set.
    let _ = tracing_log::LogTracer::init();

    match logging_config.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Human-readable console output, also the fallback for unknown formats
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::init_logging;
    use crate::config::LoggingConfig;

    #[test]
    fn initializes_the_console_subscriber() {
        init_logging(&LoggingConfig::default());
        tracing::debug!("subscriber installed");
    }

    #[test]
    #[should_panic(expected = "Invalid logging.level")]
    fn invalid_level_panics() {
        init_logging(&LoggingConfig {
            level: "verbose".to_string(),
            format: "console".to_string(),
        });
    }
}
