//! Answers address queries for the local host.

use crate::agent::{Agent, AgentHost};
use crate::dns::{Question, RecordType, Section};
use crate::names;
use crate::transport::ReplyAddress;
use std::cell::RefCell;
use std::rc::Rc;
use tokio::time::Instant;
use tracing::trace;

/// Replies to `A` and `ANY` questions for the host's full name with the
/// address placeholder, which the transport expands per interface.
pub struct AddressResponder {
    host: Rc<dyn AgentHost>,
    name: String,
    host_full_name: RefCell<String>,
}

impl AddressResponder {
    /// `name` is the registry key, normally the host's full name.
    pub fn new(host: Rc<dyn AgentHost>, name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            host,
            name: name.into(),
            host_full_name: RefCell::new(String::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Agent for AddressResponder {
    fn start(&self, host_full_name: &str) {
        *self.host_full_name.borrow_mut() = host_full_name.to_string();
    }

    fn receive_question(&self, question: &Question, reply_address: &ReplyAddress) {
        if !matches!(question.record_type, RecordType::A | RecordType::Any) {
            return;
        }
        let matches = {
            let host_full_name = self.host_full_name.borrow();
            !host_full_name.is_empty() && names::names_equal(&question.name, &host_full_name)
        };
        if matches {
            trace!(name = %question.name, "Answering address query");
            self.host
                .send_addresses(Section::Answer, *reply_address, Instant::now());
        }
    }

    fn quit(&self) {
        self.host.remove_agent(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::ResourcePtr;
    use std::rc::Weak;

    #[derive(Default)]
    struct RecordingHost {
        addresses: RefCell<Vec<(Section, ReplyAddress)>>,
        removed: RefCell<Vec<String>>,
    }

    impl AgentHost for RecordingHost {
        fn wake_at(&self, _agent: Weak<dyn Agent>, _when: Instant) {}

        fn send_question(&self, _question: Question, _when: Instant) {}

        fn send_resource(
            &self,
            _resource: ResourcePtr,
            _section: Section,
            _reply_address: ReplyAddress,
            _when: Instant,
        ) {
        }

        fn send_addresses(&self, section: Section, reply_address: ReplyAddress, _when: Instant) {
            self.addresses.borrow_mut().push((section, reply_address));
        }

        fn remove_agent(&self, name: &str) {
            self.removed.borrow_mut().push(name.to_string());
        }
    }

    #[tokio::test]
    async fn test_answers_address_queries_for_own_name() {
        let host = Rc::new(RecordingHost::default());
        let agent_host: Rc<dyn AgentHost> = host.clone();
        let responder = AddressResponder::new(agent_host, "myhost.local.");
        assert_eq!(responder.name(), "myhost.local.");
        let from = ReplyAddress::new("10.0.0.9:5353".parse().unwrap(), 3);

        responder.receive_question(&Question::new("myhost.local.", RecordType::A), &from);
        assert!(host.addresses.borrow().is_empty());

        responder.start("myhost.local.");
        responder.receive_question(&Question::new("MyHost.local", RecordType::A), &from);
        responder.receive_question(&Question::new("myhost.local.", RecordType::Any), &from);
        responder.receive_question(&Question::new("myhost.local.", RecordType::Txt), &from);
        responder.receive_question(&Question::new("other.local.", RecordType::A), &from);

        assert_eq!(
            *host.addresses.borrow(),
            vec![(Section::Answer, from), (Section::Answer, from)]
        );

        responder.quit();
        assert_eq!(*host.removed.borrow(), vec![responder.name().to_string()]);
    }
}
