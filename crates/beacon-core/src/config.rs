//! Configuration for the mDNS engine.
//!
//! This module provides the engine's settings with:
//! - Loading from YAML files
//! - Environment variable overrides (`BEACON__*`)
//! - Validation of all settings
//!
//! Every field has a default, so an empty document is a valid configuration.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Root configuration for an mDNS engine instance.
///
/// # Examples
///
/// ```
/// use beacon_core::config::MdnsConfig;
///
/// let config = MdnsConfig::from_yaml("host_name: myhost").unwrap();
/// assert_eq!(config.host_name.as_deref(), Some("myhost"));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MdnsConfig {
    /// Local host name (without `.local.`); the system host name when unset
    #[serde(default)]
    pub host_name: Option<String>,

    /// Interfaces handed to the transport before it starts
    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,

    /// Unsolicited announcement schedule
    #[serde(default)]
    pub announcement: AnnouncementConfig,

    /// Default record TTLs
    #[serde(default)]
    pub ttl: TtlConfig,

    /// Host-name resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MdnsConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] for a missing file,
    /// [`CoreError::Io`](crate::CoreError::Io) if it cannot be read, and
    /// [`ConfigError::InvalidFormat`] if it cannot be parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path.display().to_string()).into());
        }
        let contents = std::fs::read_to_string(path)?;

        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads configuration using the `config` crate, layering `BEACON__*`
    /// environment variables over the file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or merged.
    pub fn from_config_builder<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(
                config::Environment::with_prefix("BEACON")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        config.try_deserialize().map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<()> {
        self.announcement.validate()?;
        self.resolver.validate()?;
        self.logging.parse_level()?;

        if let Some(name) = &self.host_name {
            if name.is_empty() || name.contains('.') {
                return Err(ConfigError::invalid_value(
                    "host_name",
                    format!("'{}' must be a single non-empty label", name),
                )
                .into());
            }
        }

        for interface in &self.interfaces {
            if interface.name.is_empty() {
                return Err(ConfigError::invalid_value("interfaces.name", "cannot be empty").into());
            }
        }

        Ok(())
    }

    /// Returns the configured host name, or the system host name when unset.
    ///
    /// # Errors
    ///
    /// Returns an error if no host name is configured and the system one
    /// cannot be read.
    pub fn effective_host_name(&self) -> Result<String> {
        if let Some(name) = &self.host_name {
            return Ok(name.clone());
        }

        let system = hostname::get().map_err(|e| ConfigError::HostNameUnavailable {
            reason: e.to_string(),
        })?;
        let system = system.to_string_lossy();
        // Strip any domain the OS reports; mDNS host names live under `local.`
        let label = system.split('.').next().unwrap_or_default();
        if label.is_empty() {
            return Err(ConfigError::HostNameUnavailable {
                reason: "system host name is empty".to_string(),
            }
            .into());
        }
        Ok(label.to_string())
    }
}

/// A network interface the transport should use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Interface name (e.g. `eth0`)
    pub name: String,

    /// Address family to enable on the interface
    #[serde(default)]
    pub family: AddressFamily,
}

/// IP address family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    V4,
    V6,
}

/// Unsolicited announcement schedule.
///
/// Announcements start `initial_interval_ms` apart and the spacing doubles
/// after each one; once it exceeds `max_interval_ms` no further announcements
/// are scheduled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementConfig {
    /// Spacing between the first and second announcement
    #[serde(default = "default_initial_interval")]
    pub initial_interval_ms: u64,

    /// Largest spacing that is still followed by another announcement
    #[serde(default = "default_max_interval")]
    pub max_interval_ms: u64,
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval(),
            max_interval_ms: default_max_interval(),
        }
    }
}

impl AnnouncementConfig {
    /// Returns the initial interval as a Duration
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    /// Returns the interval bound as a Duration
    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.initial_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "announcement.initial_interval_ms",
                "must be greater than 0",
            )
            .into());
        }
        if self.max_interval_ms < self.initial_interval_ms {
            return Err(ConfigError::invalid_value(
                "announcement.max_interval_ms",
                "must not be smaller than initial_interval_ms",
            )
            .into());
        }
        Ok(())
    }
}

fn default_initial_interval() -> u64 {
    1000
}

fn default_max_interval() -> u64 {
    4000
}

/// Default record TTLs, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtlConfig {
    #[serde(default = "default_short_ttl")]
    pub ptr_secs: u32,

    #[serde(default = "default_short_ttl")]
    pub srv_secs: u32,

    #[serde(default = "default_long_ttl")]
    pub txt_secs: u32,

    #[serde(default = "default_short_ttl")]
    pub address_secs: u32,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            ptr_secs: default_short_ttl(),
            srv_secs: default_short_ttl(),
            txt_secs: default_long_ttl(),
            address_secs: default_short_ttl(),
        }
    }
}

// RFC 6762 section 10: 120s for records naming a host, 75 minutes otherwise
fn default_short_ttl() -> u32 {
    120
}

fn default_long_ttl() -> u32 {
    4500
}

/// Host-name resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// How long a resolution waits for an answer
    #[serde(default = "default_resolver_timeout")]
    pub timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_resolver_timeout(),
        }
    }
}

impl ResolverConfig {
    /// Returns the resolution timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(
                ConfigError::invalid_value("resolver.timeout_ms", "must be greater than 0").into(),
            );
        }
        Ok(())
    }
}

fn default_resolver_timeout() -> u64 {
    3000
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level> {
        self.level.parse().map_err(|_| {
            ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!("Invalid log level: {}", self.level),
            }
            .into()
        })
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
}
