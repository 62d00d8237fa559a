//! In-memory DNS message model.
//!
//! These are the values the engine schedules and the transport encodes.
//! Wire encoding and parsing live in the transport.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::rc::Rc;

/// Shared handle to a resource record.
///
/// Resources are compared by identity when an outbound message is assembled,
/// so two agents enqueueing equal but distinct records both get sent.
pub type ResourcePtr = Rc<Resource>;

/// DNS record types used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    A,
    Ptr,
    Txt,
    Aaaa,
    Srv,
    Any,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordType::A => "A",
            RecordType::Ptr => "PTR",
            RecordType::Txt => "TXT",
            RecordType::Aaaa => "AAAA",
            RecordType::Srv => "SRV",
            RecordType::Any => "ANY",
        };
        f.write_str(name)
    }
}

/// Message section a resource is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    Answer,
    Authority,
    Additional,
}

impl Section {
    /// All sections in message order.
    pub const ALL: [Section; 3] = [Section::Answer, Section::Authority, Section::Additional];
}

/// A question: which records of which type are wanted for a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Question {
    pub name: String,
    pub record_type: RecordType,
}

impl Question {
    pub fn new(name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            name: name.into(),
            record_type,
        }
    }
}

/// Type-specific record payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    /// IPv4 host address. `0.0.0.0` marks the local-host placeholder that
    /// the transport replaces with each interface's address.
    A(Ipv4Addr),
    /// Pointer to another domain name
    Ptr(String),
    /// Service location
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    /// Free-form text strings
    Txt(Vec<String>),
}

/// A resource record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub ttl: u32,
    /// mDNS cache-flush bit (unique records)
    pub cache_flush: bool,
    pub data: RecordData,
}

impl Resource {
    pub fn new(name: impl Into<String>, ttl: u32, data: RecordData) -> Self {
        Self {
            name: name.into(),
            ttl,
            cache_flush: false,
            data,
        }
    }

    /// The placeholder address record for the local host.
    pub fn address_placeholder(host_full_name: &str, ttl: u32) -> Self {
        Self {
            name: host_full_name.to_string(),
            ttl,
            cache_flush: true,
            data: RecordData::A(Ipv4Addr::UNSPECIFIED),
        }
    }

    pub fn record_type(&self) -> RecordType {
        match self.data {
            RecordData::A(_) => RecordType::A,
            RecordData::Ptr(_) => RecordType::Ptr,
            RecordData::Srv { .. } => RecordType::Srv,
            RecordData::Txt(_) => RecordType::Txt,
        }
    }

    /// Whether this is the local-host address placeholder.
    pub fn is_address_placeholder(&self) -> bool {
        matches!(self.data, RecordData::A(addr) if addr.is_unspecified())
    }
}

/// Message header flags the engine cares about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub response: bool,
    pub authoritative: bool,
}

impl Header {
    pub fn set_authoritative_response(&mut self) {
        self.response = true;
        self.authoritative = true;
    }
}

/// A DNS message.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourcePtr>,
    pub authorities: Vec<ResourcePtr>,
    pub additionals: Vec<ResourcePtr>,
}

impl Message {
    /// A query carrying the given questions.
    pub fn query(questions: Vec<Question>) -> Self {
        Self {
            questions,
            ..Default::default()
        }
    }

    pub fn resources(&self, section: Section) -> &[ResourcePtr] {
        match section {
            Section::Answer => &self.answers,
            Section::Authority => &self.authorities,
            Section::Additional => &self.additionals,
        }
    }

    pub fn resources_mut(&mut self, section: Section) -> &mut Vec<ResourcePtr> {
        match section {
            Section::Answer => &mut self.answers,
            Section::Authority => &mut self.authorities,
            Section::Additional => &mut self.additionals,
        }
    }

    /// Adds a resource unless this exact object is already in the message.
    ///
    /// Returns whether the resource was added.
    pub fn add_resource(&mut self, resource: ResourcePtr, section: Section) -> bool {
        if self.contains(&resource) {
            return false;
        }
        self.resources_mut(section).push(resource);
        true
    }

    /// Whether this exact resource object is present in any section.
    pub fn contains(&self, resource: &ResourcePtr) -> bool {
        Section::ALL
            .iter()
            .any(|&section| self.resources(section).iter().any(|r| Rc::ptr_eq(r, resource)))
    }

    /// All resources with their sections, in message order.
    pub fn all_resources(&self) -> impl Iterator<Item = (Section, &ResourcePtr)> {
        Section::ALL
            .into_iter()
            .flat_map(move |section| self.resources(section).iter().map(move |r| (section, r)))
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
            && self.answers.is_empty()
            && self.authorities.is_empty()
            && self.additionals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_resource_deduplicates_by_identity() {
        let mut message = Message::default();
        let ptr = Rc::new(Resource::new(
            "_http._tcp.local.",
            120,
            RecordData::Ptr("web._http._tcp.local.".to_string()),
        ));

        assert!(message.add_resource(Rc::clone(&ptr), Section::Answer));
        assert!(!message.add_resource(Rc::clone(&ptr), Section::Answer));
        assert!(!message.add_resource(Rc::clone(&ptr), Section::Additional));

        // An equal but distinct object is a separate record
        let twin = Rc::new((*ptr).clone());
        assert!(message.add_resource(twin, Section::Answer));
        assert_eq!(message.answers.len(), 2);
        assert!(message.additionals.is_empty());
    }

    #[test]
    fn test_address_placeholder() {
        let placeholder = Resource::address_placeholder("myhost.local.", 120);
        assert!(placeholder.is_address_placeholder());
        assert_eq!(placeholder.record_type(), RecordType::A);

        let real = Resource::new("myhost.local.", 120, RecordData::A(Ipv4Addr::new(10, 0, 0, 7)));
        assert!(!real.is_address_placeholder());
    }

    #[test]
    fn test_all_resources_order() {
        let mut message = Message::default();
        let additional = Rc::new(Resource::new("b", 1, RecordData::Txt(vec![])));
        let answer = Rc::new(Resource::new("a", 1, RecordData::Txt(vec![])));
        message.add_resource(additional, Section::Additional);
        message.add_resource(answer, Section::Answer);

        let names: Vec<_> = message.all_resources().map(|(_, r)| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
