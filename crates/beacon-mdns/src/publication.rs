//! What a service instance advertises, and where it comes from.

use crate::error::DelegateError;
use async_trait::async_trait;
use beacon_core::config::TtlConfig;
use serde::{Deserialize, Serialize};

/// The records a service instance currently advertises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub port: u16,
    #[serde(default)]
    pub text: Vec<String>,
    pub ptr_ttl_seconds: u32,
    pub srv_ttl_seconds: u32,
    pub txt_ttl_seconds: u32,
}

impl Publication {
    /// A publication using the default TTLs.
    pub fn new(port: u16, text: Vec<String>) -> Self {
        Self::with_ttls(port, text, &TtlConfig::default())
    }

    pub fn with_ttls(port: u16, text: Vec<String>, ttl: &TtlConfig) -> Self {
        Self {
            port,
            text,
            ptr_ttl_seconds: ttl.ptr_secs,
            srv_ttl_seconds: ttl.srv_secs,
            txt_ttl_seconds: ttl.txt_secs,
        }
    }

    /// The same publication with every TTL forced to zero.
    pub fn goodbye(&self) -> Self {
        Self {
            ptr_ttl_seconds: 0,
            srv_ttl_seconds: 0,
            txt_ttl_seconds: 0,
            ..self.clone()
        }
    }
}

/// Outcome of a publication, reported through `update_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationResult {
    /// The instance is being advertised
    Success,
    /// Another host advertises the same instance name
    NameConflict,
}

/// One-shot status callback for statically configured instances.
pub type StatusCallback = Box<dyn FnOnce(PublicationResult)>;

/// Supplies publications on demand for instances whose content can change.
#[async_trait(?Send)]
pub trait PublicationDelegate {
    /// Returns the current publication. `query` is true when answering a
    /// question, and `subtype` is the queried subtype or empty. `Ok(None)`
    /// declines to answer.
    ///
    /// Any error is treated as loss of the delegate.
    async fn get_publication(
        &self,
        query: bool,
        subtype: &str,
    ) -> Result<Option<Publication>, DelegateError>;

    fn update_status(&self, result: PublicationResult);
}
