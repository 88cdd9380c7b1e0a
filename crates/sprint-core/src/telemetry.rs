//! Logging setup
//!
//! `RUST_LOG` wins over the configured filter when set.

use crate::config::{ConfigError, TelemetryConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Build the filter for a telemetry config
///
/// # Errors
/// [`ConfigError::Invalid`] if the configured directive does not parse
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, ConfigError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| ConfigError::Invalid(format!("telemetry.filter: {e}"))),
    }
}

/// Install the global `tracing` subscriber
///
/// Returns `false` if a subscriber was already installed.
///
/// # Errors
/// [`ConfigError::Invalid`] for an unparsable filter
pub fn init_tracing(config: &TelemetryConfig) -> Result<bool, ConfigError> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    Ok(installed.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filter_is_config_error() {
        let config = TelemetryConfig {
            filter: "sprint_core=loud".to_string(),
            json: false,
        };
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(matches!(env_filter(&config), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn second_init_is_noop() {
        let config = TelemetryConfig::default();
        let _ = init_tracing(&config).unwrap();
        assert!(!init_tracing(&config).unwrap());
    }
}
