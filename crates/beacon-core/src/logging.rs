//! Tracing subscriber setup.

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{ConfigError, Result};
use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber for the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level when set.
///
/// # Errors
///
/// Returns an error if the level is invalid or a subscriber is already
/// installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let level = config.parse_level()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| {
        ConfigError::LoggingInitFailed {
            reason: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_init_rejects_bad_level() {
        let config = LoggingConfig {
            level: "chatty".to_string(),
            ..Default::default()
        };
        assert!(init(&config).is_err());
    }

    #[test]
    fn test_init_installs_subscriber_once() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Json,
        };
        assert!(init(&config).is_ok());
        tracing::debug!(component = "logging", "Subscriber installed");

        let again = init(&config);
        assert!(matches!(
            again,
            Err(CoreError::Config(ConfigError::LoggingInitFailed { .. }))
        ));
    }
}
