//! Structured logging configuration.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::TelemetryConfig;

fn env_filter(config: &TelemetryConfig) -> EnvFilter {
    // RUST_LOG wins over the configured level.
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Initializes logging based on configuration.
///
/// # Examples
///
/// ```
/// use phenex::TelemetryConfig;
///
/// phenex::init_logging(&TelemetryConfig::new("demo").with_log_level("debug"));
/// tracing::debug!("ready");
/// ```
///
/// # Panics
///
/// Panics if a global subscriber is already installed; use
/// [`try_init_logging`] in tests.
pub fn init_logging(config: &TelemetryConfig) {
    if config.json_logs {
        tracing_subscriber::registry()
            .with(env_filter(config))
            .with(fmt::layer().json().with_span_events(FmtSpan::CLOSE))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter(config))
            .with(fmt::layer().with_target(true))
            .init();
    }

    tracing::info!(
        service = %config.service_name,
        level = %config.log_level,
        json = config.json_logs,
        "Logging initialized"
    );
}

/// Initializes logging, keeping an already-installed subscriber.
///
/// Test binaries race to install the global subscriber; the loser keeps
/// the winner's.
pub fn try_init_logging(config: &TelemetryConfig) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt::layer().with_target(true))
        .try_init();
}
