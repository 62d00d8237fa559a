//! Error types for the mDNS engine

use beacon_core::CoreError;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, MdnsError>;

/// Errors surfaced by the engine's owner-facing operations.
///
/// Enqueueing and dispatch never fail; only starting the engine and the
/// publish/resolve conveniences report errors.
#[derive(Debug, Error)]
pub enum MdnsError {
    /// The transport could not start (e.g. no usable interface)
    #[error("Failed to start mDNS transport: {0}")]
    TransportStartFailed(String),

    /// Engine already started
    #[error("mDNS engine is already started")]
    AlreadyStarted,

    /// Host name is not a valid single DNS label
    #[error("Invalid host name: {0}")]
    InvalidHostName(String),

    /// Service name is not of the form `_name._tcp` or `_name._udp`
    #[error("Invalid service name: {0}")]
    InvalidServiceName(String),

    /// Instance name is empty or too long
    #[error("Invalid instance name: {0}")]
    InvalidInstanceName(String),

    /// Subtype name is empty or too long
    #[error("Invalid subtype name: {0}")]
    InvalidSubtypeName(String),

    /// The instance is already published through this engine
    #[error("Service instance already published: {0}")]
    AlreadyPublished(String),

    /// No instance with this name is published through this engine
    #[error("Service instance not published: {0}")]
    NotPublished(String),

    /// Configuration rejected
    #[error("Configuration error: {0}")]
    Config(#[from] CoreError),
}

/// Errors reported by a transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No interface could be bound
    #[error("No usable network interface")]
    NoUsableInterface,

    /// Socket-level failure
    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a publication delegate.
///
/// Any delegate error is treated by the responder as a lost connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DelegateError {
    /// The delegate went away
    #[error("Publication delegate disconnected")]
    Disconnected,

    /// The delegate failed to produce a publication
    #[error("Publication delegate failed: {0}")]
    Failed(String),
}
