//! Boundary to the per-interface UDP transport.
//!
//! The engine never touches sockets. A [`Transceiver`] encodes outbound
//! messages, substitutes the address placeholder with each interface's
//! address, and delivers parsed inbound messages through the
//! [`InboundHandler`] it receives at start.

use crate::dns::Message;
use crate::error::TransportError;
use beacon_core::AddressFamily;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Standard mDNS UDP port.
pub const MDNS_PORT: u16 = 5353;

/// IPv4 mDNS multicast group.
pub const MDNS_MULTICAST_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// Interface index meaning "every enabled interface".
pub const ALL_INTERFACES: u32 = 0;

/// Where an outbound message goes, or where an inbound one came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplyAddress {
    pub socket_address: SocketAddr,
    pub interface_index: u32,
}

impl ReplyAddress {
    pub fn new(socket_address: SocketAddr, interface_index: u32) -> Self {
        Self {
            socket_address,
            interface_index,
        }
    }

    /// The mDNS multicast group on every interface.
    pub fn multicast() -> Self {
        Self::new(
            SocketAddr::new(IpAddr::V4(MDNS_MULTICAST_V4), MDNS_PORT),
            ALL_INTERFACES,
        )
    }

    pub fn is_multicast(&self) -> bool {
        self.socket_address.ip().is_multicast()
    }
}

impl Default for ReplyAddress {
    fn default() -> Self {
        Self::multicast()
    }
}

/// Callback through which a transport delivers parsed inbound messages.
///
/// Must not be invoked from inside [`Transceiver::send_message`] or
/// [`Transceiver::start`]; deliver from the transport's own receive task.
pub type InboundHandler = Box<dyn Fn(Message, ReplyAddress)>;

/// The transport the engine sends and receives through.
pub trait Transceiver {
    /// Adds an interface to use once started.
    fn enable_interface(&mut self, name: &str, family: AddressFamily);

    /// Binds sockets and begins delivering inbound messages.
    fn start(
        &mut self,
        host_full_name: &str,
        inbound: InboundHandler,
    ) -> Result<(), TransportError>;

    fn stop(&mut self);

    /// Sends a message. A multicast `reply_address` with
    /// [`ALL_INTERFACES`] sends on every enabled interface.
    fn send_message(&mut self, message: &Message, reply_address: &ReplyAddress);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multicast_reply_address() {
        let multicast = ReplyAddress::multicast();
        assert!(multicast.is_multicast());
        assert_eq!(multicast.socket_address.port(), MDNS_PORT);
        assert_eq!(multicast.interface_index, ALL_INTERFACES);
        assert_eq!(ReplyAddress::default(), multicast);
    }

    #[test]
    fn test_unicast_reply_address() {
        let unicast = ReplyAddress::new("192.168.1.20:5353".parse().unwrap(), 2);
        assert!(!unicast.is_multicast());
        assert_ne!(unicast, ReplyAddress::multicast());
    }
}
