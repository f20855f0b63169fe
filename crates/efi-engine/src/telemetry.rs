//! Tracing subscriber setup for binaries

use crate::config::TelemetryConfig;
use crate::error::EngineError;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// # Errors
/// `EngineError::Telemetry` if a subscriber is already installed
pub fn init(config: &TelemetryConfig) -> Result<(), EngineError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| EngineError::Telemetry(e.to_string()))
}
