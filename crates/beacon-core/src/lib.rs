//! # Beacon Core
//!
//! Foundation shared by the beacon mDNS crates:
//!
//! - **Errors**: [`CoreError`] and [`ConfigError`], serializable for
//!   structured logging.
//! - **Configuration**: [`MdnsConfig`], loadable from YAML with
//!   `BEACON__*` environment overrides, plus validation.
//! - **Logging**: [`logging::init`] installs a `tracing` subscriber.
//!
//! ## Example
//!
//! ```
//! use beacon_core::config::MdnsConfig;
//!
//! let config = MdnsConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.announcement.max_interval_ms, 4000);
//! ```

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AddressFamily, MdnsConfig};
pub use error::{ConfigError, CoreError, Result};
