//! # Beacon mDNS
//!
//! Multicast DNS service discovery: advertise service instances and resolve
//! host names on the local link without a central directory.
//!
//! ## Overview
//!
//! - [`Mdns`] owns a registry of [`Agent`]s and multiplexes them over one
//!   [`Transceiver`] and one timer, coalescing due work into as few
//!   messages and timers as possible.
//! - [`InstanceResponder`] announces a service instance with doubling
//!   spacing, answers queries for it and withdraws it with a goodbye.
//! - [`AddressResponder`] and [`HostNameResolver`] handle the local host's
//!   address and `.local.` name lookups.
//!
//! The engine is single-threaded. Timers and delegate fetches run as local
//! tasks, so drive a started engine from inside a [`tokio::task::LocalSet`].
//! DNS wire encoding and sockets belong to the [`Transceiver`]
//! implementation.
//!
//! ## Example
//!
//! ```no_run
//! use beacon_core::MdnsConfig;
//! use beacon_mdns::{Mdns, Transceiver};
//! use tokio::task::LocalSet;
//!
//! async fn advertise(transceiver: Box<dyn Transceiver>) -> beacon_mdns::Result<()> {
//!     let mdns = Mdns::new(transceiver, MdnsConfig::default())?;
//!     LocalSet::new()
//!         .run_until(async {
//!             mdns.start("myhost")?;
//!             mdns.publish_service_instance(
//!                 "_http._tcp",
//!                 "My Server",
//!                 mdns.publication(8080, vec!["path=/".to_string()]),
//!                 Box::new(|result| tracing::info!(?result, "Publication status")),
//!             )?;
//!             std::future::pending::<()>().await;
//!             Ok(())
//!         })
//!         .await
//! }
//! ```

pub mod address_responder;
pub mod agent;
pub mod dns;
pub mod engine;
pub mod error;
pub mod host_name_resolver;
pub mod instance_responder;
pub mod names;
pub mod publication;
mod queue;
pub mod transport;

pub use address_responder::AddressResponder;
pub use agent::{Agent, AgentHost};
pub use dns::{Message, Question, RecordData, RecordType, Resource, ResourcePtr, Section};
pub use engine::{EngineStats, Mdns};
pub use error::{DelegateError, MdnsError, Result, TransportError};
pub use host_name_resolver::{HostNameResolver, ResolveCallback};
pub use instance_responder::{AnnouncementPolicy, InstanceResponder, ResponderState};
pub use publication::{Publication, PublicationDelegate, PublicationResult, StatusCallback};
pub use transport::{InboundHandler, ReplyAddress, Transceiver};
