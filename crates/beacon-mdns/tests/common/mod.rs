//! Common test utilities for engine integration tests

#![allow(dead_code)]

use beacon_core::AddressFamily;
use beacon_mdns::{
    Agent, InboundHandler, Message, ReplyAddress, ResourcePtr, Transceiver, TransportError,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio::time::Instant;

/// One message handed to the mock transport.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub at: Instant,
    pub message: Message,
    pub reply_address: ReplyAddress,
}

impl SentMessage {
    pub fn resources(&self) -> Vec<ResourcePtr> {
        self.message.all_resources().map(|(_, r)| r.clone()).collect()
    }

    pub fn has_resource_named(&self, name: &str) -> bool {
        self.message.all_resources().any(|(_, r)| r.name == name)
    }
}

/// Test-side view of a [`MockTransceiver`].
#[derive(Clone, Default)]
pub struct MockHandle {
    sent: Rc<RefCell<Vec<SentMessage>>>,
    inbound: Rc<RefCell<Option<InboundHandler>>>,
    pub fail_start: Rc<Cell<bool>>,
    pub starts: Rc<Cell<usize>>,
    pub stops: Rc<Cell<usize>>,
    pub interfaces: Rc<RefCell<Vec<(String, AddressFamily)>>>,
}

impl MockHandle {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.borrow().clone()
    }

    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    /// Delivers `message` to the engine as if received from `from`.
    pub fn deliver(&self, message: Message, from: ReplyAddress) {
        let inbound = self.inbound.borrow();
        let handler = inbound.as_ref().expect("transport not started");
        handler(message, from);
    }
}

/// Transport that records outbound messages instead of sending them.
pub struct MockTransceiver {
    handle: MockHandle,
}

impl Transceiver for MockTransceiver {
    fn enable_interface(&mut self, name: &str, family: AddressFamily) {
        self.handle
            .interfaces
            .borrow_mut()
            .push((name.to_string(), family));
    }

    fn start(&mut self, _host_full_name: &str, inbound: InboundHandler) -> Result<(), TransportError> {
        if self.handle.fail_start.get() {
            return Err(TransportError::NoUsableInterface);
        }
        self.handle.starts.set(self.handle.starts.get() + 1);
        *self.handle.inbound.borrow_mut() = Some(inbound);
        Ok(())
    }

    fn stop(&mut self) {
        self.handle.stops.set(self.handle.stops.get() + 1);
        *self.handle.inbound.borrow_mut() = None;
    }

    fn send_message(&mut self, message: &Message, reply_address: &ReplyAddress) {
        self.handle.sent.borrow_mut().push(SentMessage {
            at: Instant::now(),
            message: message.clone(),
            reply_address: *reply_address,
        });
    }
}

/// Creates a mock transport and the handle used to inspect it.
pub fn mock_transceiver() -> (Box<dyn Transceiver>, MockHandle) {
    let handle = MockHandle::default();
    let transceiver = MockTransceiver {
        handle: handle.clone(),
    };
    (Box::new(transceiver), handle)
}

/// Agent that records every hook invocation as a string.
pub struct RecordingAgent {
    label: String,
    pub events: Rc<RefCell<Vec<String>>>,
    pub starts: Cell<usize>,
    pub wakes: Cell<usize>,
}

impl RecordingAgent {
    pub fn new(label: &str, events: &Rc<RefCell<Vec<String>>>) -> Rc<Self> {
        Rc::new(Self {
            label: label.to_string(),
            events: Rc::clone(events),
            starts: Cell::new(0),
            wakes: Cell::new(0),
        })
    }

    fn record(&self, event: String) {
        self.events
            .borrow_mut()
            .push(format!("{}:{}", self.label, event));
    }
}

impl Agent for RecordingAgent {
    fn start(&self, host_full_name: &str) {
        self.starts.set(self.starts.get() + 1);
        self.record(format!("start {}", host_full_name));
    }

    fn receive_question(&self, question: &beacon_mdns::Question, _reply_address: &ReplyAddress) {
        self.record(format!("question {}", question.name));
    }

    fn receive_resource(&self, resource: &beacon_mdns::Resource, section: beacon_mdns::Section) {
        self.record(format!("resource {} {:?}", resource.name, section));
    }

    fn end_of_message(&self) {
        self.record("end".to_string());
    }

    fn wake(&self) {
        self.wakes.set(self.wakes.get() + 1);
        self.record("wake".to_string());
    }

    fn quit(&self) {
        self.record("quit".to_string());
    }
}

/// Installs a test log subscriber; repeated calls are harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("beacon_mdns=debug")
        .with_test_writer()
        .try_init();
}
