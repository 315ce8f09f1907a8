//! Session events and the publish/subscribe bus
//!
//! Events form a closed enumeration split into lifecycle and payload
//! families. Subscribers register per [`EventKind`] and are invoked
//! synchronously, in subscription order. A panicking subscriber is logged and
//! skipped; it never prevents the remaining subscribers from running.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, trace};

use crate::envelope::Envelope;
use crate::errors::SessionError;

// ----------------------------------------------------------------------------
// Event Types
// ----------------------------------------------------------------------------

/// Connection lifecycle notifications
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Connecting,
    Connected,
    Disconnected { code: u16, reason: String },
    Reconnecting {
        attempt: u32,
        delay: Duration,
        max_attempts: u32,
    },
    ReconnectFailed { attempts: u32 },
    Error(SessionError),
}

/// Inbound payloads dispatched by envelope type
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadEvent {
    Notification(Value),
    AuthSuccess(Option<Value>),
    AuthError(Option<Value>),
    ServerError(Option<Value>),
    /// Any other inbound envelope, delivered whole
    Message(Envelope),
}

/// Everything the session reports to its subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Lifecycle(LifecycleEvent),
    Payload(PayloadEvent),
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Lifecycle(event) => match event {
                LifecycleEvent::Connecting => EventKind::Connecting,
                LifecycleEvent::Connected => EventKind::Connected,
                LifecycleEvent::Disconnected { .. } => EventKind::Disconnected,
                LifecycleEvent::Reconnecting { .. } => EventKind::Reconnecting,
                LifecycleEvent::ReconnectFailed { .. } => EventKind::ReconnectFailed,
                LifecycleEvent::Error(_) => EventKind::Error,
            },
            Self::Payload(event) => match event {
                PayloadEvent::Notification(_) => EventKind::Notification,
                PayloadEvent::AuthSuccess(_) => EventKind::AuthSuccess,
                PayloadEvent::AuthError(_) => EventKind::AuthError,
                PayloadEvent::ServerError(_) => EventKind::ServerError,
                PayloadEvent::Message(_) => EventKind::Message,
            },
        }
    }

    pub fn error(err: impl Into<SessionError>) -> Self {
        Self::Lifecycle(LifecycleEvent::Error(err.into()))
    }
}

impl From<LifecycleEvent> for SessionEvent {
    fn from(event: LifecycleEvent) -> Self {
        Self::Lifecycle(event)
    }
}

impl From<PayloadEvent> for SessionEvent {
    fn from(event: PayloadEvent) -> Self {
        Self::Payload(event)
    }
}

/// Subscription key, one per event variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
    ReconnectFailed,
    Error,
    Notification,
    AuthSuccess,
    AuthError,
    ServerError,
    Message,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::Connecting,
        EventKind::Connected,
        EventKind::Disconnected,
        EventKind::Reconnecting,
        EventKind::ReconnectFailed,
        EventKind::Error,
        EventKind::Notification,
        EventKind::AuthSuccess,
        EventKind::AuthError,
        EventKind::ServerError,
        EventKind::Message,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
            Self::ReconnectFailed => "reconnect_failed",
            Self::Error => "error",
            Self::Notification => "notification",
            Self::AuthSuccess => "auth_success",
            Self::AuthError => "auth_error",
            Self::ServerError => "server_error",
            Self::Message => "message",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ----------------------------------------------------------------------------
// Event Bus
// ----------------------------------------------------------------------------

/// Handle identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Subscriber callback
pub type EventCallback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Synchronous publish/subscribe registry for [`SessionEvent`]s
#[derive(Default)]
pub struct SessionEventBus {
    subscribers: HashMap<EventKind, Vec<(SubscriptionId, EventCallback)>>,
    next_id: u64,
}

impl fmt::Debug for SessionEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .subscribers
            .iter()
            .map(|(kind, subs)| (kind.name(), subs.len()))
            .collect();
        f.debug_struct("SessionEventBus")
            .field("subscribers", &counts)
            .finish()
    }
}

impl SessionEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `kind`
    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.on_with_id(kind, id, Arc::new(callback));
        id
    }

    /// Register a callback under an id allocated by the caller
    ///
    /// Used when subscriptions are created away from the bus (for example on
    /// a handle that forwards them to the owning task).
    pub fn on_with_id(&mut self, kind: EventKind, id: SubscriptionId, callback: EventCallback) {
        self.next_id = self.next_id.max(id.0);
        self.subscribers
            .entry(kind)
            .or_default()
            .push((id, callback));
    }

    /// Remove a subscription, returning whether it existed
    pub fn off(&mut self, kind: EventKind, id: SubscriptionId) -> bool {
        let Some(subs) = self.subscribers.get_mut(&kind) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|(sub_id, _)| *sub_id != id);
        before != subs.len()
    }

    /// Deliver `event` to every subscriber of its kind
    pub fn emit(&self, event: &SessionEvent) {
        let kind = event.kind();
        let Some(subs) = self.subscribers.get(&kind) else {
            trace!("No subscribers for {} event", kind);
            return;
        };

        for (id, callback) in subs {
            let result = catch_unwind(AssertUnwindSafe(|| callback(event)));
            if result.is_err() {
                error!("Subscriber {} panicked while handling {} event", id.0, kind);
            }
        }
    }

    pub fn remove_all(&mut self) {
        self.subscribers.clear();
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.get(&kind).map_or(0, Vec::len)
    }
}
