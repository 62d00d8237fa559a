//! The mDNS engine: agent registry, deadline queues and coalescing.
//!
//! The engine multiplexes any number of [`Agent`]s over one transport and one
//! logical timer. Agents enqueue questions, resources and wakeups with
//! absolute deadlines; the engine keeps at most one timer armed for the
//! earliest pending deadline and, when it fires, assembles everything due
//! into one message per destination.
//!
//! Timers run as local tasks, so a started engine must be driven from
//! inside a [`tokio::task::LocalSet`].

use crate::address_responder::AddressResponder;
use crate::agent::{Agent, AgentHost};
use crate::dns::{Message, Question, Resource, ResourcePtr, Section};
use crate::error::{MdnsError, Result};
use crate::host_name_resolver::{HostNameResolver, ResolveCallback};
use crate::instance_responder::{AnnouncementPolicy, InstanceResponder, ResponderState};
use crate::names;
use crate::publication::{Publication, PublicationDelegate, StatusCallback};
use crate::queue::DeadlineQueue;
use crate::transport::{InboundHandler, ReplyAddress, Transceiver};
use beacon_core::MdnsConfig;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, trace};

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Registered agents
    pub agents: usize,
    /// Timers armed since creation
    pub timers_armed: u64,
    /// Messages handed to the transport
    pub messages_sent: u64,
    pub pending_questions: usize,
    pub pending_resources: usize,
    pub pending_wakes: usize,
}

struct PendingResource {
    resource: ResourcePtr,
    section: Section,
    reply_address: ReplyAddress,
}

struct EngineInner {
    config: MdnsConfig,
    self_ref: Weak<EngineInner>,
    transceiver: RefCell<Box<dyn Transceiver>>,
    started: Cell<bool>,
    host_full_name: RefCell<Option<String>>,
    agents: RefCell<BTreeMap<String, Rc<dyn Agent>>>,
    questions: RefCell<DeadlineQueue<Question>>,
    resources: RefCell<DeadlineQueue<PendingResource>>,
    wakes: RefCell<DeadlineQueue<Weak<dyn Agent>>>,
    armed: RefCell<BTreeSet<Instant>>,
    address_placeholder: RefCell<Option<ResourcePtr>>,
    responders: RefCell<HashMap<String, Weak<InstanceResponder>>>,
    next_resolve_id: Cell<u64>,
    timers_armed: Cell<u64>,
    messages_sent: Cell<u64>,
}

impl EngineInner {
    fn host(&self) -> Rc<dyn AgentHost> {
        Rc::new(EngineHost {
            engine: self.self_ref.clone(),
        })
    }

    fn host_full_name(&self) -> Option<String> {
        self.host_full_name.borrow().clone()
    }

    // Agents may call back into the engine, so they are always invoked from
    // a snapshot and never while the registry is borrowed.
    fn agent_snapshot(&self) -> Vec<Rc<dyn Agent>> {
        self.agents.borrow().values().cloned().collect()
    }

    fn add_agent(&self, name: String, agent: Rc<dyn Agent>) {
        let previous = self
            .agents
            .borrow_mut()
            .insert(name.clone(), Rc::clone(&agent));
        if previous.is_some() {
            debug!(agent = %name, "Replaced existing agent");
        } else {
            debug!(agent = %name, "Added agent");
        }

        if self.started.get() {
            if let Some(host_full_name) = self.host_full_name() {
                agent.start(&host_full_name);
            }
            self.schedule_next();
        }
    }

    fn remove_agent(&self, name: &str) {
        let removed = self.agents.borrow_mut().remove(name);
        if removed.is_some() {
            debug!(agent = %name, "Removed agent");
        }
    }

    fn tell_agent_to_quit(&self, name: &str) {
        let agent = self.agents.borrow().get(name).cloned();
        if let Some(agent) = agent {
            debug!(agent = %name, "Telling agent to quit");
            agent.quit();
        }
    }

    fn wake_at(&self, agent: Weak<dyn Agent>, when: Instant) {
        self.wakes.borrow_mut().push(when, agent);
        self.schedule_next();
    }

    fn send_question(&self, question: Question, when: Instant) {
        self.questions.borrow_mut().push(when, question);
        self.schedule_next();
    }

    fn send_resource(
        &self,
        resource: ResourcePtr,
        section: Section,
        reply_address: ReplyAddress,
        when: Instant,
    ) {
        self.resources.borrow_mut().push(
            when,
            PendingResource {
                resource,
                section,
                reply_address,
            },
        );
        self.schedule_next();
    }

    fn send_addresses(&self, section: Section, reply_address: ReplyAddress, when: Instant) {
        let placeholder = self.address_placeholder.borrow().clone();
        match placeholder {
            Some(placeholder) => self.send_resource(placeholder, section, reply_address, when),
            None => debug!("Address records requested before the host name is known"),
        }
    }

    fn receive_message(&self, message: Message, reply_address: ReplyAddress) {
        debug!(
            from = %reply_address.socket_address,
            questions = message.questions.len(),
            answers = message.answers.len(),
            "Dispatching inbound message"
        );

        let agents = self.agent_snapshot();
        for question in &message.questions {
            for agent in &agents {
                agent.receive_question(question, &reply_address);
            }
        }
        for (section, resource) in message.all_resources() {
            for agent in &agents {
                agent.receive_resource(resource, section);
            }
        }
        for agent in &agents {
            agent.end_of_message();
        }

        self.send_pending();
        self.schedule_next();
    }

    /// Sends everything due, one message per destination.
    fn send_pending(&self) {
        if !self.started.get() {
            return;
        }

        let now = Instant::now();
        let mut outbound: Vec<(ReplyAddress, Message)> = Vec::new();

        {
            let mut questions = self.questions.borrow_mut();
            while let Some(question) = questions.pop_due(now) {
                message_for(&mut outbound, ReplyAddress::multicast())
                    .questions
                    .push(question);
            }
        }
        {
            let mut resources = self.resources.borrow_mut();
            while let Some(pending) = resources.pop_due(now) {
                message_for(&mut outbound, pending.reply_address)
                    .add_resource(pending.resource, pending.section);
            }
        }

        for (reply_address, mut message) in outbound {
            if message.is_empty() {
                continue;
            }
            if message.questions.is_empty() {
                message.header.set_authoritative_response();
            }
            trace!(
                to = %reply_address.socket_address,
                questions = message.questions.len(),
                answers = message.answers.len(),
                additionals = message.additionals.len(),
                "Sending message"
            );
            self.transceiver
                .borrow_mut()
                .send_message(&message, &reply_address);
            self.messages_sent.set(self.messages_sent.get() + 1);
        }
    }

    /// Arms a timer for the earliest pending deadline unless one is already
    /// armed at or before it.
    fn schedule_next(&self) {
        if !self.started.get() {
            return;
        }

        let next = [
            self.wakes.borrow().next_deadline(),
            self.questions.borrow().next_deadline(),
            self.resources.borrow().next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min();
        let Some(next) = next else {
            return;
        };

        {
            let mut armed = self.armed.borrow_mut();
            if armed.first().is_some_and(|deadline| *deadline <= next) {
                return;
            }
            armed.insert(next);
        }
        self.timers_armed.set(self.timers_armed.get() + 1);
        trace!(deadline = ?next, "Arming timer");

        let engine = self.self_ref.clone();
        tokio::task::spawn_local(async move {
            tokio::time::sleep_until(next).await;
            if let Some(engine) = engine.upgrade() {
                engine.on_timer(next);
            }
        });
    }

    fn on_timer(&self, fired: Instant) {
        self.armed.borrow_mut().retain(|deadline| *deadline > fired);
        if !self.started.get() {
            return;
        }

        let now = Instant::now();
        let due: Vec<Weak<dyn Agent>> = {
            let mut wakes = self.wakes.borrow_mut();
            std::iter::from_fn(|| wakes.pop_due(now)).collect()
        };
        for agent in due {
            if let Some(agent) = agent.upgrade() {
                agent.wake();
            }
        }

        self.send_pending();
        self.schedule_next();
    }
}

fn message_for(
    outbound: &mut Vec<(ReplyAddress, Message)>,
    reply_address: ReplyAddress,
) -> &mut Message {
    let index = match outbound.iter().position(|(address, _)| *address == reply_address) {
        Some(index) => index,
        None => {
            outbound.push((reply_address, Message::default()));
            outbound.len() - 1
        }
    };
    &mut outbound[index].1
}

/// The capabilities agents receive. Holds the engine weakly, so agents never
/// keep a dropped engine alive.
struct EngineHost {
    engine: Weak<EngineInner>,
}

impl AgentHost for EngineHost {
    fn wake_at(&self, agent: Weak<dyn Agent>, when: Instant) {
        if let Some(engine) = self.engine.upgrade() {
            engine.wake_at(agent, when);
        }
    }

    fn send_question(&self, question: Question, when: Instant) {
        if let Some(engine) = self.engine.upgrade() {
            engine.send_question(question, when);
        }
    }

    fn send_resource(
        &self,
        resource: ResourcePtr,
        section: Section,
        reply_address: ReplyAddress,
        when: Instant,
    ) {
        if let Some(engine) = self.engine.upgrade() {
            engine.send_resource(resource, section, reply_address, when);
        }
    }

    fn send_addresses(&self, section: Section, reply_address: ReplyAddress, when: Instant) {
        if let Some(engine) = self.engine.upgrade() {
            engine.send_addresses(section, reply_address, when);
        }
    }

    fn remove_agent(&self, name: &str) {
        if let Some(engine) = self.engine.upgrade() {
            engine.remove_agent(name);
        }
    }
}

/// Handle to an mDNS engine.
///
/// # Examples
///
/// ```ignore
/// let mdns = Mdns::new(Box::new(transceiver), MdnsConfig::default())?;
/// LocalSet::new()
///     .run_until(async {
///         mdns.start("myhost")?;
///         mdns.publish_service_instance(
///             "_http._tcp",
///             "My Server",
///             mdns.publication(8080, vec!["path=/".to_string()]),
///             Box::new(|result| println!("{result:?}")),
///         )
///     })
///     .await?;
/// ```
pub struct Mdns {
    inner: Rc<EngineInner>,
}

impl Mdns {
    /// Creates an engine over `transceiver`. Configured interfaces are
    /// enabled on the transceiver right away.
    ///
    /// # Errors
    ///
    /// Returns [`MdnsError::Config`] if the configuration is invalid.
    pub fn new(mut transceiver: Box<dyn Transceiver>, config: MdnsConfig) -> Result<Self> {
        config.validate()?;

        for interface in &config.interfaces {
            debug!(interface = %interface.name, family = ?interface.family, "Enabling interface");
            transceiver.enable_interface(&interface.name, interface.family);
        }

        let inner = Rc::new_cyclic(|self_ref| EngineInner {
            config,
            self_ref: self_ref.clone(),
            transceiver: RefCell::new(transceiver),
            started: Cell::new(false),
            host_full_name: RefCell::new(None),
            agents: RefCell::new(BTreeMap::new()),
            questions: RefCell::new(DeadlineQueue::new()),
            resources: RefCell::new(DeadlineQueue::new()),
            wakes: RefCell::new(DeadlineQueue::new()),
            armed: RefCell::new(BTreeSet::new()),
            address_placeholder: RefCell::new(None),
            responders: RefCell::new(HashMap::new()),
            next_resolve_id: Cell::new(0),
            timers_armed: Cell::new(0),
            messages_sent: Cell::new(0),
        });

        Ok(Self { inner })
    }

    /// Starts the transport and every registered agent.
    ///
    /// Registers the local host's address responder, then starts the
    /// transport. Agents are started only once the transport is up; on
    /// failure nothing is started and `start` may be called again.
    ///
    /// # Errors
    ///
    /// - [`MdnsError::AlreadyStarted`] if the engine is running
    /// - [`MdnsError::InvalidHostName`] if `host_name` is not a single label
    /// - [`MdnsError::TransportStartFailed`] if the transport cannot start
    pub fn start(&self, host_name: &str) -> Result<()> {
        let inner = &self.inner;
        if inner.started.get() {
            return Err(MdnsError::AlreadyStarted);
        }
        if !names::is_valid_host_name(host_name) {
            return Err(MdnsError::InvalidHostName(host_name.to_string()));
        }

        let host_full_name = names::local_host_full_name(host_name);
        *inner.host_full_name.borrow_mut() = Some(host_full_name.clone());
        *inner.address_placeholder.borrow_mut() = Some(Rc::new(Resource::address_placeholder(
            &host_full_name,
            inner.config.ttl.address_secs,
        )));

        let address_responder = AddressResponder::new(inner.host(), host_full_name.clone());
        inner.add_agent(address_responder.name().to_string(), address_responder);

        let engine = Rc::downgrade(inner);
        let inbound: InboundHandler = Box::new(move |message, reply_address| {
            if let Some(engine) = engine.upgrade() {
                engine.receive_message(message, reply_address);
            }
        });

        let started = inner
            .transceiver
            .borrow_mut()
            .start(&host_full_name, inbound);
        if let Err(e) = started {
            error!(host = %host_full_name, error = %e, "Failed to start mDNS transport");
            inner.remove_agent(&host_full_name);
            return Err(MdnsError::TransportStartFailed(e.to_string()));
        }

        inner.started.set(true);
        info!(
            host = %host_full_name,
            agents = inner.agents.borrow().len(),
            "mDNS engine started"
        );

        for agent in inner.agent_snapshot() {
            agent.start(&host_full_name);
        }
        inner.send_pending();
        inner.schedule_next();
        Ok(())
    }

    /// Starts with the configured host name, or the system host name when
    /// none is configured.
    ///
    /// # Errors
    ///
    /// As [`Mdns::start`], plus [`MdnsError::Config`] when no host name can
    /// be determined.
    pub fn start_with_configured_host(&self) -> Result<()> {
        let host_name = self.inner.config.effective_host_name()?;
        self.start(&host_name)
    }

    /// Stops the transport. Registered agents and queued work are kept.
    pub fn stop(&self) {
        if !self.inner.started.get() {
            return;
        }
        self.inner.transceiver.borrow_mut().stop();
        self.inner.started.set(false);
        info!("mDNS engine stopped");
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.get()
    }

    /// The local host's full name, once `start` has been called.
    pub fn host_full_name(&self) -> Option<String> {
        self.inner.host_full_name()
    }

    pub fn config(&self) -> &MdnsConfig {
        &self.inner.config
    }

    /// Agent-facing capabilities, for constructing custom agents.
    pub fn host(&self) -> Rc<dyn AgentHost> {
        self.inner.host()
    }

    /// Registers an agent under `name`, replacing any agent of that name.
    /// The agent is started immediately if the engine is running.
    pub fn add_agent(&self, name: impl Into<String>, agent: Rc<dyn Agent>) {
        self.inner.add_agent(name.into(), agent);
    }

    pub fn remove_agent(&self, name: &str) {
        self.inner.remove_agent(name);
    }

    /// Asks the named agent to quit; no-op if there is none.
    pub fn tell_agent_to_quit(&self, name: &str) {
        self.inner.tell_agent_to_quit(name);
    }

    pub fn has_agent(&self, name: &str) -> bool {
        self.inner.agents.borrow().contains_key(name)
    }

    pub fn agent_count(&self) -> usize {
        self.inner.agents.borrow().len()
    }

    pub fn stats(&self) -> EngineStats {
        let inner = &self.inner;
        EngineStats {
            agents: inner.agents.borrow().len(),
            timers_armed: inner.timers_armed.get(),
            messages_sent: inner.messages_sent.get(),
            pending_questions: inner.questions.borrow().len(),
            pending_resources: inner.resources.borrow().len(),
            pending_wakes: inner.wakes.borrow().len(),
        }
    }

    /// Builds a publication carrying the configured record TTLs.
    pub fn publication(&self, port: u16, text: Vec<String>) -> Publication {
        Publication::with_ttls(port, text, &self.inner.config.ttl)
    }

    /// Publishes a service instance with a fixed publication.
    ///
    /// `callback` receives the first status report for the instance.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is invalid or the instance is already
    /// published.
    pub fn publish_service_instance(
        &self,
        service_name: &str,
        instance_name: &str,
        publication: Publication,
        callback: StatusCallback,
    ) -> Result<()> {
        self.check_publishable(service_name, instance_name)?;
        let responder = InstanceResponder::new_static(
            self.host(),
            service_name,
            instance_name,
            publication,
            callback,
            self.announcement_policy(),
        );
        self.register_responder(responder);
        Ok(())
    }

    /// Publishes a service instance whose publication is fetched from
    /// `delegate` whenever it is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is invalid or the instance is already
    /// published.
    pub fn add_responder(
        &self,
        service_name: &str,
        instance_name: &str,
        delegate: Rc<dyn PublicationDelegate>,
    ) -> Result<()> {
        self.check_publishable(service_name, instance_name)?;
        let responder = InstanceResponder::new_delegated(
            self.host(),
            service_name,
            instance_name,
            delegate,
            self.announcement_policy(),
            &self.inner.config.ttl,
        );
        self.register_responder(responder);
        Ok(())
    }

    /// Withdraws a published instance. The goodbye is sent before the
    /// responder is removed.
    ///
    /// # Errors
    ///
    /// Returns [`MdnsError::NotPublished`] if the instance is unknown.
    pub fn unpublish_service_instance(&self, service_name: &str, instance_name: &str) -> Result<()> {
        let responder = self.published_responder(service_name, instance_name)?;
        self.inner.tell_agent_to_quit(responder.name());
        Ok(())
    }

    /// Replaces the subtypes a published instance is advertised under.
    ///
    /// # Errors
    ///
    /// Returns an error if a subtype is invalid or the instance is unknown.
    pub fn set_subtypes(
        &self,
        service_name: &str,
        instance_name: &str,
        subtypes: Vec<String>,
    ) -> Result<()> {
        if let Some(invalid) = subtypes.iter().find(|s| !names::is_valid_subtype_name(s)) {
            return Err(MdnsError::InvalidSubtypeName(invalid.clone()));
        }
        let responder = self.published_responder(service_name, instance_name)?;
        responder.set_subtypes(subtypes);
        Ok(())
    }

    /// Restarts the announcement sequence of a published instance.
    ///
    /// # Errors
    ///
    /// Returns [`MdnsError::NotPublished`] if the instance is unknown.
    pub fn reannounce_instance(&self, service_name: &str, instance_name: &str) -> Result<()> {
        self.published_responder(service_name, instance_name)?
            .reannounce();
        Ok(())
    }

    /// Resolves `<host_name>.local.` to an IPv4 address.
    ///
    /// `callback` runs once with the address, or with `None` when nothing
    /// answers within `timeout` (the configured resolver timeout if `None`).
    ///
    /// # Errors
    ///
    /// Returns [`MdnsError::InvalidHostName`] if `host_name` is invalid.
    pub fn resolve_host_name(
        &self,
        host_name: &str,
        timeout: Option<Duration>,
        callback: ResolveCallback,
    ) -> Result<()> {
        if !names::is_valid_host_name(host_name) {
            return Err(MdnsError::InvalidHostName(host_name.to_string()));
        }

        let id = self.inner.next_resolve_id.get();
        self.inner.next_resolve_id.set(id + 1);
        let name = format!("resolve:{}:{}", names::local_host_full_name(host_name), id);
        let timeout = timeout.unwrap_or_else(|| self.inner.config.resolver.timeout());

        let resolver = HostNameResolver::new(self.host(), name, host_name, timeout, callback);
        self.inner.add_agent(resolver.name().to_string(), resolver);
        Ok(())
    }

    fn announcement_policy(&self) -> AnnouncementPolicy {
        AnnouncementPolicy::from(&self.inner.config.announcement)
    }

    fn check_publishable(&self, service_name: &str, instance_name: &str) -> Result<()> {
        if !names::is_valid_service_name(service_name) {
            return Err(MdnsError::InvalidServiceName(service_name.to_string()));
        }
        if !names::is_valid_instance_name(instance_name) {
            return Err(MdnsError::InvalidInstanceName(instance_name.to_string()));
        }
        let instance_full_name = names::local_instance_full_name(instance_name, service_name);
        if self.live_responder(&instance_full_name).is_some() {
            return Err(MdnsError::AlreadyPublished(instance_full_name));
        }
        Ok(())
    }

    fn register_responder(&self, responder: Rc<InstanceResponder>) {
        let name = responder.name().to_string();
        self.inner
            .responders
            .borrow_mut()
            .insert(name.clone(), Rc::downgrade(&responder));
        self.inner.add_agent(name, responder);
    }

    fn published_responder(
        &self,
        service_name: &str,
        instance_name: &str,
    ) -> Result<Rc<InstanceResponder>> {
        let instance_full_name = names::local_instance_full_name(instance_name, service_name);
        self.live_responder(&instance_full_name)
            .ok_or(MdnsError::NotPublished(instance_full_name))
    }

    fn live_responder(&self, instance_full_name: &str) -> Option<Rc<InstanceResponder>> {
        let responder = self
            .inner
            .responders
            .borrow()
            .get(instance_full_name)
            .and_then(Weak::upgrade)?;
        (responder.state() != ResponderState::Removed).then_some(responder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use beacon_core::AddressFamily;

    #[derive(Default)]
    struct IdleTransceiver {
        interfaces: Rc<RefCell<Vec<String>>>,
    }

    impl Transceiver for IdleTransceiver {
        fn enable_interface(&mut self, name: &str, _family: AddressFamily) {
            self.interfaces.borrow_mut().push(name.to_string());
        }

        fn start(
            &mut self,
            _host_full_name: &str,
            _inbound: InboundHandler,
        ) -> std::result::Result<(), TransportError> {
            Ok(())
        }

        fn stop(&mut self) {}

        fn send_message(&mut self, _message: &Message, _reply_address: &ReplyAddress) {}
    }

    fn engine() -> Mdns {
        Mdns::new(Box::new(IdleTransceiver::default()), MdnsConfig::default()).unwrap()
    }

    fn publication() -> Publication {
        Publication::new(8080, vec!["path=/".to_string()])
    }

    #[test]
    fn test_new_enables_configured_interfaces() {
        let transceiver = IdleTransceiver::default();
        let interfaces = Rc::clone(&transceiver.interfaces);
        let config = MdnsConfig::from_yaml("interfaces:\n  - name: eth0\n  - name: wlan0\n").unwrap();

        let _mdns = Mdns::new(Box::new(transceiver), config).unwrap();
        assert_eq!(*interfaces.borrow(), vec!["eth0".to_string(), "wlan0".to_string()]);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = MdnsConfig::from_yaml("resolver:\n  timeout_ms: 0\n").unwrap();
        let result = Mdns::new(Box::new(IdleTransceiver::default()), config);
        assert!(matches!(result, Err(MdnsError::Config(_))));
    }

    #[test]
    fn test_start_rejects_invalid_host_name() {
        let mdns = engine();
        assert!(matches!(mdns.start("my.host"), Err(MdnsError::InvalidHostName(_))));
        assert!(matches!(mdns.start(""), Err(MdnsError::InvalidHostName(_))));
        assert!(!mdns.is_started());
    }

    #[test]
    fn test_start_with_configured_host() {
        let config = MdnsConfig::from_yaml("host_name: printer").unwrap();
        let mdns = Mdns::new(Box::new(IdleTransceiver::default()), config).unwrap();

        // Nothing is queued yet, so no timer task is spawned
        mdns.start_with_configured_host().unwrap();
        assert!(mdns.is_started());
        assert_eq!(mdns.host_full_name().as_deref(), Some("printer.local."));
        assert!(mdns.has_agent("printer.local."));

        mdns.stop();
        assert!(!mdns.is_started());
    }

    #[test]
    fn test_publish_validates_names() {
        let mdns = engine();
        let result = mdns.publish_service_instance("http", "web", publication(), Box::new(|_| {}));
        assert!(matches!(result, Err(MdnsError::InvalidServiceName(_))));

        let result = mdns.publish_service_instance("_http._tcp", "", publication(), Box::new(|_| {}));
        assert!(matches!(result, Err(MdnsError::InvalidInstanceName(_))));

        let result = mdns.resolve_host_name("bad.name", None, Box::new(|_, _| {}));
        assert!(matches!(result, Err(MdnsError::InvalidHostName(_))));
        assert_eq!(mdns.agent_count(), 0);
    }

    #[test]
    fn test_publish_before_start_registers_without_sending() {
        let mdns = engine();
        mdns.publish_service_instance("_http._tcp", "web", publication(), Box::new(|_| {}))
            .unwrap();

        assert!(mdns.has_agent("web._http._tcp.local."));
        let result = mdns.publish_service_instance("_http._tcp", "web", publication(), Box::new(|_| {}));
        assert!(matches!(result, Err(MdnsError::AlreadyPublished(_))));

        let stats = mdns.stats();
        assert_eq!(stats.agents, 1);
        assert_eq!(stats.pending_resources, 0);
        assert_eq!(stats.timers_armed, 0);
    }

    #[test]
    fn test_unknown_instance_operations() {
        let mdns = engine();
        assert!(matches!(
            mdns.unpublish_service_instance("_http._tcp", "web"),
            Err(MdnsError::NotPublished(_))
        ));
        assert!(matches!(
            mdns.reannounce_instance("_http._tcp", "web"),
            Err(MdnsError::NotPublished(_))
        ));
        assert!(matches!(
            mdns.set_subtypes("_http._tcp", "web", vec!["_a".to_string()]),
            Err(MdnsError::NotPublished(_))
        ));
        assert!(matches!(
            mdns.set_subtypes("_http._tcp", "web", vec!["a.b".to_string()]),
            Err(MdnsError::InvalidSubtypeName(_))
        ));
    }

    #[test]
    fn test_unpublish_before_start_removes_instance() {
        let mdns = engine();
        mdns.publish_service_instance("_http._tcp", "web", publication(), Box::new(|_| {}))
            .unwrap();

        mdns.unpublish_service_instance("_http._tcp", "web").unwrap();
        assert_eq!(mdns.agent_count(), 0);

        // The name is free again
        mdns.publish_service_instance("_http._tcp", "web", publication(), Box::new(|_| {}))
            .unwrap();
        assert_eq!(mdns.agent_count(), 1);
    }

    #[test]
    fn test_message_for_groups_by_destination() {
        let mut outbound = Vec::new();
        let unicast = ReplyAddress::new("10.0.0.4:5353".parse().unwrap(), 2);

        message_for(&mut outbound, ReplyAddress::multicast())
            .questions
            .push(Question::new("a.local.", crate::dns::RecordType::A));
        message_for(&mut outbound, unicast);
        message_for(&mut outbound, ReplyAddress::multicast())
            .questions
            .push(Question::new("b.local.", crate::dns::RecordType::A));

        assert_eq!(outbound.len(), 2);
        assert_eq!(outbound[0].0, ReplyAddress::multicast());
        assert_eq!(outbound[0].1.questions.len(), 2);
        assert_eq!(outbound[1].0, unicast);
    }
}
