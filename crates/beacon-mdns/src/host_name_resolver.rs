//! One-shot resolution of a `.local.` host name to an IPv4 address.

use crate::agent::{Agent, AgentHost};
use crate::dns::{Question, RecordData, RecordType, Resource, Section};
use crate::names;
use std::cell::{Cell, RefCell};
use std::net::Ipv4Addr;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Receives the host name and the resolved address, or `None` on timeout.
pub type ResolveCallback = Box<dyn FnOnce(String, Option<Ipv4Addr>)>;

/// Queries for a host's address and reports the first answer.
///
/// The callback runs exactly once: after the first message carrying an
/// answer, at the timeout, or when the resolver is told to quit.
pub struct HostNameResolver {
    host: Rc<dyn AgentHost>,
    name: String,
    host_name: String,
    host_full_name: String,
    timeout: Duration,
    deadline: Cell<Option<Instant>>,
    address: Cell<Option<Ipv4Addr>>,
    callback: RefCell<Option<ResolveCallback>>,
    self_ref: Weak<HostNameResolver>,
}

impl HostNameResolver {
    /// `name` is the registry key the resolver removes itself under.
    pub fn new(
        host: Rc<dyn AgentHost>,
        name: impl Into<String>,
        host_name: &str,
        timeout: Duration,
        callback: ResolveCallback,
    ) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            host,
            name: name.into(),
            host_name: host_name.to_string(),
            host_full_name: names::local_host_full_name(host_name),
            timeout,
            deadline: Cell::new(None),
            address: Cell::new(None),
            callback: RefCell::new(Some(callback)),
            self_ref: self_ref.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn finish(&self) {
        let callback = self.callback.borrow_mut().take();
        let Some(callback) = callback else {
            return;
        };
        let address = self.address.get();
        debug!(host = %self.host_full_name, address = ?address, "Host name resolution finished");
        callback(self.host_name.clone(), address);
        self.host.remove_agent(&self.name);
    }
}

impl Agent for HostNameResolver {
    fn start(&self, _host_full_name: &str) {
        if self.deadline.get().is_some() {
            return;
        }
        let now = Instant::now();
        let deadline = now + self.timeout;
        self.deadline.set(Some(deadline));

        self.host.send_question(
            Question::new(self.host_full_name.clone(), RecordType::A),
            now,
        );
        let agent: Weak<dyn Agent> = self.self_ref.clone();
        self.host.wake_at(agent, deadline);
    }

    fn receive_resource(&self, resource: &Resource, _section: Section) {
        if self.address.get().is_some() || !names::names_equal(&resource.name, &self.host_full_name)
        {
            return;
        }
        if let RecordData::A(address) = resource.data {
            if !resource.is_address_placeholder() {
                self.address.set(Some(address));
            }
        }
    }

    fn end_of_message(&self) {
        if self.address.get().is_some() {
            self.finish();
        }
    }

    fn wake(&self) {
        if self
            .deadline
            .get()
            .is_some_and(|deadline| deadline <= Instant::now())
        {
            self.finish();
        }
    }

    fn quit(&self) {
        self.finish();
    }
}
