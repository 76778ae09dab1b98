//! Logging initialization and configuration.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Builds the filter: `RUST_LOG` wins, then the configured level.
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes the logging subsystem based on configuration.
///
/// `format` is `json` for structured output, anything else selects the
/// human-readable pretty printer. Calling this twice is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let subscriber = tracing_subscriber::registry().with(env_filter(config));

    let result = match config.format.as_str() {
        "json" => {
            let json_layer = fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
                .with_target(true);
            subscriber.with(json_layer).try_init()
        }
        _ => {
            let pretty_layer = fmt::layer()
                .pretty()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true);
            subscriber.with(pretty_layer).try_init()
        }
    };

    if let Err(e) = result {
        tracing::debug!("Logging already initialized: {}", e);
    }
}
