//! The contract between the engine and its agents.
//!
//! An agent is one independently scheduled protocol task (a responder or a
//! resolver). The engine calls an agent through [`Agent`]; the agent calls
//! back through the [`AgentHost`] it was constructed with.
//!
//! Agents are held as `Rc<dyn Agent>` and use interior mutability, so every
//! hook takes `&self`. Host operations only enqueue work and never call back
//! into an agent synchronously, so an agent may call its host while holding
//! its own state borrowed.

use crate::dns::{Question, Resource, ResourcePtr, Section};
use crate::transport::ReplyAddress;
use std::rc::Weak;
use tokio::time::Instant;

/// Hooks the engine invokes on every registered agent.
///
/// For each inbound message an agent sees every question, then every
/// resource, then [`Agent::end_of_message`].
pub trait Agent {
    /// Called once the engine is started, with the local host's full name.
    fn start(&self, host_full_name: &str);

    fn receive_question(&self, question: &Question, reply_address: &ReplyAddress) {
        let _ = (question, reply_address);
    }

    fn receive_resource(&self, resource: &Resource, section: Section) {
        let _ = (resource, section);
    }

    /// All questions and resources of the current inbound message have been
    /// delivered.
    fn end_of_message(&self) {}

    /// A wakeup requested through [`AgentHost::wake_at`] is due.
    fn wake(&self) {}

    /// Asks the agent to wind down. The agent removes itself from the
    /// registry when done.
    fn quit(&self);
}

/// Engine capabilities available to agents.
pub trait AgentHost {
    /// Schedules [`Agent::wake`] at `when`. The engine holds only a weak
    /// reference, so a wakeup for a removed agent is dropped.
    fn wake_at(&self, agent: Weak<dyn Agent>, when: Instant);

    fn send_question(&self, question: Question, when: Instant);

    fn send_resource(
        &self,
        resource: ResourcePtr,
        section: Section,
        reply_address: ReplyAddress,
        when: Instant,
    );

    /// Sends the local host's address records.
    fn send_addresses(&self, section: Section, reply_address: ReplyAddress, when: Instant);

    /// Unregisters the named agent. Agents call this with their own name.
    fn remove_agent(&self, name: &str);
}
