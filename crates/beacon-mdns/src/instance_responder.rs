//! Agent that advertises one service instance.
//!
//! On start the responder announces the instance with doubling spacing until
//! the spacing exceeds the configured bound, then answers only queries. Quit
//! sends a goodbye (all TTLs zero) before the responder removes itself.
//!
//! Publications come either from a fixed value given at construction or from
//! a [`PublicationDelegate`] queried on every send. Delegate fetches run as
//! local tasks and re-enter the responder when they complete; a responder
//! that has been dropped in the meantime simply ignores the result.

use crate::agent::{Agent, AgentHost};
use crate::dns::{Question, RecordData, RecordType, Resource, Section};
use crate::error::DelegateError;
use crate::names;
use crate::publication::{Publication, PublicationDelegate, PublicationResult, StatusCallback};
use crate::transport::ReplyAddress;
use beacon_core::config::{AnnouncementConfig, TtlConfig};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Announcement spacing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnouncementPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for AnnouncementPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(4),
        }
    }
}

impl From<&AnnouncementConfig> for AnnouncementPolicy {
    fn from(config: &AnnouncementConfig) -> Self {
        Self {
            initial_interval: config.initial_interval(),
            max_interval: config.max_interval(),
        }
    }
}

/// Lifecycle of an instance responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderState {
    /// Constructed, engine not started yet
    Idle,
    /// Sending unsolicited announcements
    Announcing,
    /// Answering queries only
    Steady,
    /// Waiting for the delegate before sending the goodbye
    Quitting,
    /// Goodbye sent and removed from the engine
    Removed,
}

enum PublicationSource {
    Static {
        publication: Publication,
        callback: RefCell<Option<StatusCallback>>,
    },
    Delegated(Rc<dyn PublicationDelegate>),
}

struct ResponderInner {
    host_full_name: String,
    state: ResponderState,
    subtypes: Vec<String>,
    announcement_interval: Duration,
    next_announcement: Option<Instant>,
    last_publication: Option<Publication>,
}

/// Advertises one named service instance under the local host.
pub struct InstanceResponder {
    host: Rc<dyn AgentHost>,
    policy: AnnouncementPolicy,
    /// PTR TTL used before a delegate has supplied any publication
    default_ptr_ttl: u32,
    service_name: String,
    instance_name: String,
    service_full_name: String,
    instance_full_name: String,
    source: PublicationSource,
    inner: RefCell<ResponderInner>,
    self_ref: Weak<InstanceResponder>,
}

impl InstanceResponder {
    /// Creates a responder for a fixed publication. `callback` receives the
    /// first status report.
    pub fn new_static(
        host: Rc<dyn AgentHost>,
        service_name: &str,
        instance_name: &str,
        publication: Publication,
        callback: StatusCallback,
        policy: AnnouncementPolicy,
    ) -> Rc<Self> {
        let default_ptr_ttl = publication.ptr_ttl_seconds;
        let source = PublicationSource::Static {
            publication,
            callback: RefCell::new(Some(callback)),
        };
        Self::new(host, service_name, instance_name, source, policy, default_ptr_ttl)
    }

    /// Creates a responder that fetches its publication from `delegate`.
    ///
    /// `ttl` supplies the PTR TTL for answers sent before the first fetch
    /// completes.
    pub fn new_delegated(
        host: Rc<dyn AgentHost>,
        service_name: &str,
        instance_name: &str,
        delegate: Rc<dyn PublicationDelegate>,
        policy: AnnouncementPolicy,
        ttl: &TtlConfig,
    ) -> Rc<Self> {
        let source = PublicationSource::Delegated(delegate);
        Self::new(host, service_name, instance_name, source, policy, ttl.ptr_secs)
    }

    fn new(
        host: Rc<dyn AgentHost>,
        service_name: &str,
        instance_name: &str,
        source: PublicationSource,
        policy: AnnouncementPolicy,
        default_ptr_ttl: u32,
    ) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            host,
            policy,
            default_ptr_ttl,
            service_name: service_name.to_string(),
            instance_name: instance_name.to_string(),
            service_full_name: names::local_service_full_name(service_name),
            instance_full_name: names::local_instance_full_name(instance_name, service_name),
            source,
            inner: RefCell::new(ResponderInner {
                host_full_name: String::new(),
                state: ResponderState::Idle,
                subtypes: Vec::new(),
                announcement_interval: policy.initial_interval,
                next_announcement: None,
                last_publication: None,
            }),
            self_ref: self_ref.clone(),
        })
    }

    /// The instance's full name, which is also its registry key.
    pub fn name(&self) -> &str {
        &self.instance_full_name
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn state(&self) -> ResponderState {
        self.inner.borrow().state
    }

    pub fn subtypes(&self) -> Vec<String> {
        self.inner.borrow().subtypes.clone()
    }

    /// Replaces the active subtypes.
    ///
    /// Each subtype that is no longer active gets a goodbye PTR, and the
    /// instance is announced again.
    pub fn set_subtypes(&self, subtypes: Vec<String>) {
        let mut unique: Vec<String> = Vec::with_capacity(subtypes.len());
        for subtype in subtypes {
            if !unique.contains(&subtype) {
                unique.push(subtype);
            }
        }

        let (withdrawn, started) = {
            let mut inner = self.inner.borrow_mut();
            if matches!(inner.state, ResponderState::Quitting | ResponderState::Removed) {
                return;
            }
            let withdrawn: Vec<String> = inner
                .subtypes
                .iter()
                .filter(|subtype| !unique.contains(subtype))
                .cloned()
                .collect();
            inner.subtypes = unique;
            (withdrawn, inner.state != ResponderState::Idle)
        };

        if !started {
            return;
        }

        let now = Instant::now();
        for subtype in &withdrawn {
            debug!(instance = %self.instance_full_name, subtype = %subtype, "Withdrawing subtype");
            self.send_subtype_ptr(subtype, 0, ReplyAddress::multicast(), now);
        }

        self.reannounce();
    }

    /// Restarts the announcement sequence from the initial interval.
    pub fn reannounce(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if !matches!(
                inner.state,
                ResponderState::Announcing | ResponderState::Steady
            ) {
                return;
            }
            inner.state = ResponderState::Announcing;
            inner.announcement_interval = self.policy.initial_interval;
        }
        self.send_announcement();
    }

    /// Reports a publication status to the delegate or the static callback.
    pub fn update_status(&self, result: PublicationResult) {
        match &self.source {
            PublicationSource::Static { callback, .. } => {
                let callback = callback.borrow_mut().take();
                if let Some(callback) = callback {
                    callback(result);
                }
            }
            PublicationSource::Delegated(delegate) => delegate.update_status(result),
        }
    }

    fn send_announcement(&self) {
        self.get_and_send_publication(false, String::new(), ReplyAddress::multicast());

        let when = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != ResponderState::Announcing {
                return;
            }
            if inner.announcement_interval > self.policy.max_interval {
                inner.next_announcement = None;
                inner.state = ResponderState::Steady;
                debug!(instance = %self.instance_full_name, "Announcements complete");
                return;
            }
            let when = Instant::now() + inner.announcement_interval;
            inner.next_announcement = Some(when);
            inner.announcement_interval *= 2;
            when
        };

        let agent: Weak<dyn Agent> = self.self_ref.clone();
        self.host.wake_at(agent, when);
    }

    fn get_and_send_publication(&self, query: bool, subtype: String, reply_address: ReplyAddress) {
        match &self.source {
            PublicationSource::Static { publication, .. } => {
                self.send_publication(publication, query, &subtype, reply_address);
            }
            PublicationSource::Delegated(delegate) => {
                let delegate = Rc::clone(delegate);
                let responder = self.self_ref.clone();
                tokio::task::spawn_local(async move {
                    let result = delegate.get_publication(query, &subtype).await;
                    if let Some(responder) = responder.upgrade() {
                        responder.on_publication(result, query, &subtype, reply_address);
                    }
                });
            }
        }
    }

    fn on_publication(
        &self,
        result: Result<Option<Publication>, DelegateError>,
        query: bool,
        subtype: &str,
        reply_address: ReplyAddress,
    ) {
        let publication = match result {
            Ok(publication) => publication,
            Err(error) => {
                if self.state() != ResponderState::Removed {
                    warn!(
                        instance = %self.instance_full_name,
                        error = %error,
                        "Publication delegate lost, removing instance"
                    );
                    self.withdraw_and_remove();
                }
                return;
            }
        };

        let state = {
            let mut inner = self.inner.borrow_mut();
            if let Some(publication) = &publication {
                inner.last_publication = Some(publication.clone());
            }
            inner.state
        };

        match state {
            ResponderState::Removed => {}
            ResponderState::Quitting => self.withdraw_and_remove(),
            _ => {
                if let Some(publication) = publication {
                    self.send_publication(&publication, query, subtype, reply_address);
                }
            }
        }
    }

    fn send_publication(
        &self,
        publication: &Publication,
        query: bool,
        subtype: &str,
        reply_address: ReplyAddress,
    ) {
        self.send_records(publication, query, subtype, reply_address, true);
    }

    fn send_goodbye(&self, publication: &Publication) {
        info!(instance = %self.instance_full_name, "Sending goodbye");
        self.send_records(
            &publication.goodbye(),
            false,
            "",
            ReplyAddress::multicast(),
            false,
        );
    }

    fn send_records(
        &self,
        publication: &Publication,
        query: bool,
        subtype: &str,
        reply_address: ReplyAddress,
        include_addresses: bool,
    ) {
        let (host_full_name, announced_subtypes) = {
            let inner = self.inner.borrow();
            let subtypes = if query {
                Vec::new()
            } else {
                inner.subtypes.clone()
            };
            (inner.host_full_name.clone(), subtypes)
        };

        let now = Instant::now();
        let detail_section = if query {
            Section::Additional
        } else {
            Section::Answer
        };

        if !subtype.is_empty() {
            self.send_subtype_ptr(subtype, publication.ptr_ttl_seconds, reply_address, now);
        }
        for subtype in &announced_subtypes {
            self.send_subtype_ptr(subtype, publication.ptr_ttl_seconds, reply_address, now);
        }

        let ptr = Resource::new(
            self.service_full_name.clone(),
            publication.ptr_ttl_seconds,
            RecordData::Ptr(self.instance_full_name.clone()),
        );
        self.host
            .send_resource(Rc::new(ptr), Section::Answer, reply_address, now);

        let mut srv = Resource::new(
            self.instance_full_name.clone(),
            publication.srv_ttl_seconds,
            RecordData::Srv {
                priority: 0,
                weight: 0,
                port: publication.port,
                target: host_full_name,
            },
        );
        srv.cache_flush = true;
        self.host
            .send_resource(Rc::new(srv), detail_section, reply_address, now);

        let mut txt = Resource::new(
            self.instance_full_name.clone(),
            publication.txt_ttl_seconds,
            RecordData::Txt(publication.text.clone()),
        );
        txt.cache_flush = true;
        self.host
            .send_resource(Rc::new(txt), detail_section, reply_address, now);

        if include_addresses {
            self.host.send_addresses(detail_section, reply_address, now);
        }
    }

    fn send_subtype_ptr(&self, subtype: &str, ttl: u32, reply_address: ReplyAddress, when: Instant) {
        let ptr = Resource::new(
            names::local_service_subtype_full_name(&self.service_name, subtype),
            ttl,
            RecordData::Ptr(self.instance_full_name.clone()),
        );
        self.host
            .send_resource(Rc::new(ptr), Section::Answer, reply_address, when);
    }

    fn send_service_type_ptr(&self, reply_address: ReplyAddress) {
        let ttl = self.current_ptr_ttl();
        let ptr = Resource::new(
            names::SERVICE_TYPE_ENUMERATION_NAME,
            ttl,
            RecordData::Ptr(self.service_full_name.clone()),
        );
        self.host
            .send_resource(Rc::new(ptr), Section::Answer, reply_address, Instant::now());
    }

    fn current_ptr_ttl(&self) -> u32 {
        match &self.source {
            PublicationSource::Static { publication, .. } => publication.ptr_ttl_seconds,
            PublicationSource::Delegated(_) => self
                .inner
                .borrow()
                .last_publication
                .as_ref()
                .map(|publication| publication.ptr_ttl_seconds)
                .unwrap_or(self.default_ptr_ttl),
        }
    }

    /// Matches a service or subtype name; inactive subtypes do not match.
    fn match_service(&self, name: &str) -> Option<String> {
        let subtype = names::match_service_name(name, &self.service_name)?;
        if subtype.is_empty() || self.inner.borrow().subtypes.contains(&subtype) {
            Some(subtype)
        } else {
            None
        }
    }

    fn is_instance_name(&self, name: &str) -> bool {
        names::names_equal(name, &self.instance_full_name)
    }

    /// Sends a goodbye for the most recent publication, if anything was
    /// announced, then removes the responder.
    fn withdraw_and_remove(&self) {
        let (announced, last) = {
            let inner = self.inner.borrow();
            (
                !inner.host_full_name.is_empty(),
                inner.last_publication.clone(),
            )
        };
        let publication = match &self.source {
            PublicationSource::Static { publication, .. } => Some(publication.clone()),
            PublicationSource::Delegated(_) => last,
        };

        if announced {
            if let Some(publication) = publication {
                self.send_goodbye(&publication);
            }
        }
        self.complete_removal();
    }

    fn complete_removal(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state == ResponderState::Removed {
                return;
            }
            inner.state = ResponderState::Removed;
            inner.next_announcement = None;
        }
        info!(instance = %self.instance_full_name, "Instance responder removed");
        self.host.remove_agent(&self.instance_full_name);
    }

    fn is_responding(&self) -> bool {
        matches!(
            self.state(),
            ResponderState::Announcing | ResponderState::Steady
        )
    }
}

impl Agent for InstanceResponder {
    fn start(&self, host_full_name: &str) {
        {
            let mut inner = self.inner.borrow_mut();
            if matches!(
                inner.state,
                ResponderState::Quitting | ResponderState::Removed
            ) {
                return;
            }
            inner.host_full_name = host_full_name.to_string();
            inner.state = ResponderState::Announcing;
        }
        debug!(instance = %self.instance_full_name, host = %host_full_name, "Starting instance responder");
        self.reannounce();
        self.update_status(PublicationResult::Success);
    }

    fn receive_question(&self, question: &Question, reply_address: &ReplyAddress) {
        if !self.is_responding() {
            return;
        }

        let name = question.name.as_str();
        let enumeration = names::names_equal(name, names::SERVICE_TYPE_ENUMERATION_NAME);
        match question.record_type {
            RecordType::Ptr => {
                if enumeration {
                    self.send_service_type_ptr(*reply_address);
                } else if let Some(subtype) = self.match_service(name) {
                    self.get_and_send_publication(true, subtype, *reply_address);
                }
            }
            RecordType::Srv | RecordType::Txt => {
                if self.is_instance_name(name) {
                    self.get_and_send_publication(true, String::new(), *reply_address);
                }
            }
            RecordType::Any => {
                if self.is_instance_name(name) {
                    self.get_and_send_publication(true, String::new(), *reply_address);
                } else if enumeration {
                    self.send_service_type_ptr(*reply_address);
                } else if let Some(subtype) = self.match_service(name) {
                    self.get_and_send_publication(true, subtype, *reply_address);
                }
            }
            _ => {}
        }
    }

    fn receive_resource(&self, resource: &Resource, _section: Section) {
        if !self.is_responding() || resource.ttl == 0 || !self.is_instance_name(&resource.name) {
            return;
        }

        let RecordData::Srv { target, .. } = &resource.data else {
            return;
        };
        let host_full_name = self.inner.borrow().host_full_name.clone();
        if names::names_equal(target, &host_full_name) {
            return;
        }

        warn!(
            instance = %self.instance_full_name,
            other_host = %target,
            "Instance name claimed by another host"
        );
        self.update_status(PublicationResult::NameConflict);
        self.complete_removal();
    }

    fn wake(&self) {
        let due = {
            let inner = self.inner.borrow();
            inner.state == ResponderState::Announcing
                && inner
                    .next_announcement
                    .is_some_and(|when| when <= Instant::now())
        };
        if due {
            self.send_announcement();
        }
    }

    fn quit(&self) {
        match self.state() {
            ResponderState::Quitting | ResponderState::Removed => return,
            ResponderState::Idle => {
                self.complete_removal();
                return;
            }
            ResponderState::Announcing | ResponderState::Steady => {}
        }

        match &self.source {
            PublicationSource::Static { .. } => self.withdraw_and_remove(),
            PublicationSource::Delegated(_) => {
                {
                    let mut inner = self.inner.borrow_mut();
                    inner.state = ResponderState::Quitting;
                    inner.next_announcement = None;
                }
                self.get_and_send_publication(false, String::new(), ReplyAddress::multicast());
            }
        }
    }
}
