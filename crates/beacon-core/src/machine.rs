//! Connection state machine
//!
//! [`ConnectionStateMachine`] owns a session: its options, lifecycle state,
//! outbound queue, subscribers and the single live transport. It is
//! synchronous. Its owner feeds it three kinds of input and nothing else:
//!
//! - collaborator requests (`connect`, `disconnect`, `send`, ...)
//! - [`TransportSignal`]s reported by the connector
//! - timer ticks, whenever the instant from [`ConnectionStateMachine::next_deadline`] passes
//!
//! Timers are plain deadlines, so cancelling one is clearing a field and can
//! never race with its firing.

use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::backoff::{format_reconnect_message, BackoffPolicy};
use crate::codec::MessageCodec;
use crate::config::{build_connect_url, validate_address, SessionOptions, SessionOptionsUpdate};
use crate::envelope::{Envelope, MessageType};
use crate::errors::{ConfigError, SessionError, TransportError};
use crate::events::{LifecycleEvent, PayloadEvent, SessionEvent, SessionEventBus};
use crate::heartbeat::HeartbeatMonitor;
use crate::state::LifecycleState;
use crate::transport::{
    is_normal_closure, Connector, OpenRequest, TransportEvent, TransportLink, TransportSignal,
    TransportSink, CLOSE_NORMAL,
};
use crate::types::{AttemptId, ClientId, SystemTimeSource, TimeSource};

const SUPERSEDED_REASON: &str = "Superseded by a new connection attempt";

// ----------------------------------------------------------------------------
// Supporting Types
// ----------------------------------------------------------------------------

/// The single live transport of a session
struct ActiveTransport {
    attempt: AttemptId,
    link: Box<dyn TransportLink>,
    open: bool,
}

/// A reconnect attempt waiting for its deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingReconnect {
    pub due: Instant,
    pub attempt: u32,
}

/// Point-in-time view of a session, cheap to copy and publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: LifecycleState,
    pub connected: bool,
    pub reconnect_attempts: u32,
    pub queued: usize,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: LifecycleState::Initial,
            connected: false,
            reconnect_attempts: 0,
            queued: 0,
        }
    }
}

// ----------------------------------------------------------------------------
// Connection State Machine
// ----------------------------------------------------------------------------

pub struct ConnectionStateMachine {
    options: SessionOptions,
    base_url: Url,
    client_id: ClientId,
    state: LifecycleState,
    backoff: BackoffPolicy,
    reconnect_attempts: u32,
    pending_reconnect: Option<PendingReconnect>,
    heartbeat: HeartbeatMonitor,
    queue: VecDeque<Envelope>,
    bus: SessionEventBus,
    codec: MessageCodec,
    connector: Box<dyn Connector>,
    sink: TransportSink,
    transport: Option<ActiveTransport>,
    last_attempt: AttemptId,
    graceful_shutdown: bool,
    last_message_id: Option<String>,
    time_source: Box<dyn TimeSource>,
}

impl fmt::Debug for ConnectionStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionStateMachine")
            .field("client_id", &self.client_id)
            .field("url", &self.base_url.as_str())
            .field("state", &self.state)
            .field("reconnect_attempts", &self.reconnect_attempts)
            .field("queued", &self.queue.len())
            .field("attempt", &self.transport.as_ref().map(|t| t.attempt))
            .finish()
    }
}

impl ConnectionStateMachine {
    /// Create a session; fails when the options are unusable
    ///
    /// Nothing is opened until [`initialize`](Self::initialize) or
    /// [`connect`](Self::connect) is called.
    pub fn new(
        options: SessionOptions,
        connector: Box<dyn Connector>,
        sink: TransportSink,
    ) -> Result<Self, ConfigError> {
        let base_url = options.validate()?;
        let client_id = options.resolve_client_id();
        debug!("Created session {} for {}", client_id, base_url);

        Ok(Self {
            backoff: BackoffPolicy::from(&options.reconnect),
            heartbeat: HeartbeatMonitor::new(options.heartbeat_interval_ms),
            options,
            base_url,
            client_id,
            state: LifecycleState::Initial,
            reconnect_attempts: 0,
            pending_reconnect: None,
            queue: VecDeque::new(),
            bus: SessionEventBus::new(),
            codec: MessageCodec::new(),
            connector,
            sink,
            transport: None,
            last_attempt: AttemptId::new(0),
            graceful_shutdown: false,
            last_message_id: None,
            time_source: Box::new(SystemTimeSource::new()),
        })
    }

    pub fn with_time_source(mut self, time_source: Box<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn with_codec(mut self, codec: MessageCodec) -> Self {
        self.codec = codec;
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// True only while connected with an open transport
    pub fn is_connected(&self) -> bool {
        self.state == LifecycleState::Connected
            && self.transport.as_ref().is_some_and(|t| t.open)
    }

    pub fn is_connecting(&self) -> bool {
        self.state == LifecycleState::Connecting
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn pending_reconnect(&self) -> Option<PendingReconnect> {
        self.pending_reconnect
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn last_message_id(&self) -> Option<&str> {
        self.last_message_id.as_deref()
    }

    pub fn heartbeat(&self) -> &HeartbeatMonitor {
        &self.heartbeat
    }

    pub fn bus_mut(&mut self) -> &mut SessionEventBus {
        &mut self.bus
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            connected: self.is_connected(),
            reconnect_attempts: self.reconnect_attempts,
            queued: self.queue.len(),
        }
    }

    /// Earliest instant at which [`on_timer`](Self::on_timer) has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        let reconnect = self.pending_reconnect.map(|p| p.due);
        match (reconnect, self.heartbeat.next_due()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // ------------------------------------------------------------------------
    // Collaborator Requests
    // ------------------------------------------------------------------------

    /// Connect on creation when configured to
    pub fn initialize(&mut self, now: Instant) {
        if !self.options.auto_connect {
            return;
        }
        if self.options.credential().is_none() {
            warn!("Auto-connect skipped for {}: no credential configured", self.client_id);
            return;
        }
        self.connect(now);
    }

    /// Open a transport, restarting the retry budget
    pub fn connect(&mut self, now: Instant) {
        if self.state == LifecycleState::Connected {
            debug!("Connect ignored: already connected");
            return;
        }
        if self.options.credential().is_none() {
            warn!("Cannot connect {}: no credential configured", self.client_id);
            self.emit(SessionEvent::error(ConfigError::MissingCredential));
            return;
        }

        self.graceful_shutdown = false;
        self.pending_reconnect = None;
        self.reconnect_attempts = 0;
        self.open_transport(now);
    }

    /// Tear down the transport on purpose; no reconnect follows
    pub fn disconnect(&mut self, code: u16, reason: &str) {
        self.graceful_shutdown = true;
        self.pending_reconnect = None;
        self.heartbeat.stop();

        if self.transport.is_none() && !self.state.is_active() {
            debug!("Disconnect ignored while {}", self.state);
            return;
        }

        self.transition(LifecycleState::Disconnecting);
        if let Some(mut transport) = self.transport.take() {
            transport.link.close(code, reason);
        }
        self.transition(LifecycleState::Disconnected);
        info!("Disconnected {} ({}: {})", self.client_id, code, reason);
        self.emit(
            LifecycleEvent::Disconnected {
                code,
                reason: reason.to_string(),
            }
            .into(),
        );
    }

    /// Disconnect and release everything the session holds
    pub fn destroy(&mut self) {
        self.disconnect(CLOSE_NORMAL, crate::config::DEFAULT_DISCONNECT_REASON);
        if !self.queue.is_empty() {
            debug!("Discarding {} queued envelopes", self.queue.len());
        }
        self.queue.clear();
        self.bus.remove_all();
        self.reconnect_attempts = 0;
        info!("Session {} destroyed", self.client_id);
    }

    /// Transmit now, or queue until the next successful connect
    ///
    /// Returns true only when the envelope was handed to an open transport.
    pub fn send(&mut self, envelope: Envelope) -> bool {
        if !self.is_connected() {
            debug!("Queueing {} envelope while {}", envelope.kind, self.state);
            self.queue.push_back(envelope);
            return false;
        }
        self.transmit(&envelope)
    }

    /// Send a notification immediately; never queued
    pub fn send_notification(&mut self, payload: Value) -> Result<(), SessionError> {
        let rejected = if !self.is_connected() {
            Some(SessionError::NotConnected)
        } else if self.options.credential().is_none() {
            Some(SessionError::from(ConfigError::MissingCredential))
        } else {
            None
        };
        if let Some(err) = rejected {
            warn!("Notification not sent: {}", err);
            self.emit(SessionEvent::error(err.clone()));
            return Err(err);
        }

        if self.transmit(&Envelope::notification(payload)) {
            Ok(())
        } else {
            Err(TransportError::SendFailed {
                reason: "transport rejected the frame".to_string(),
            }
            .into())
        }
    }

    /// Merge option changes into the live session
    ///
    /// A changed credential re-authenticates a connected session, or starts
    /// connecting an idle one. A changed address applies from the next connect.
    pub fn update_options(
        &mut self,
        update: SessionOptionsUpdate,
        now: Instant,
    ) -> Result<(), ConfigError> {
        let merged = match update.merged_into(&self.options) {
            Ok(merged) => merged,
            Err(err) => {
                warn!("Rejected options update: {}", err);
                self.emit(SessionEvent::error(err.clone()));
                return Err(err);
            }
        };

        let credential_changed =
            update.auth_token.is_some() && merged.credential() != self.options.credential();
        let heartbeat_changed = merged.heartbeat_interval_ms != self.options.heartbeat_interval_ms;

        self.base_url = validate_address(&merged.url)?;
        self.backoff = BackoffPolicy::from(&merged.reconnect);
        self.options = merged;
        if heartbeat_changed {
            self.heartbeat
                .set_interval(self.options.heartbeat_interval_ms, now);
            if self.is_connected() && !self.heartbeat.is_running() {
                self.heartbeat.start(now);
            }
        }

        if credential_changed && self.options.credential().is_some() {
            if self.is_connected() {
                info!("Credential updated, re-authenticating {}", self.client_id);
                self.send_auth();
            } else if !self.is_connecting() {
                self.connect(now);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Transport Signals
    // ------------------------------------------------------------------------

    /// Apply a signal from the connector; signals of superseded attempts are dropped
    pub fn handle_transport(&mut self, signal: TransportSignal, now: Instant) {
        let current = self.transport.as_ref().map(|t| t.attempt);
        if current != Some(signal.attempt) {
            trace!(
                "Ignoring {} from stale attempt {}",
                signal_name(&signal.event),
                signal.attempt
            );
            return;
        }

        match signal.event {
            TransportEvent::Opened => self.on_open(now),
            TransportEvent::Message(text) => self.on_message(&text),
            TransportEvent::Error(reason) => self.on_transport_error(reason),
            TransportEvent::Closed { code, reason } => self.on_close(code, reason, now),
        }
    }

    /// Fire whatever deadlines have passed at `now`
    pub fn on_timer(&mut self, now: Instant) {
        if let Some(pending) = self.pending_reconnect {
            if pending.due <= now {
                self.pending_reconnect = None;
                if self.state.is_active() {
                    debug!("Reconnect attempt {} skipped while {}", pending.attempt, self.state);
                } else {
                    info!(
                        "Reconnect attempt {}/{}",
                        pending.attempt, self.backoff.max_attempts
                    );
                    self.open_transport(now);
                }
            }
        }

        if self.heartbeat.poll(now) {
            if self.is_connected() {
                let beat = Envelope::heartbeat(self.time_source.now());
                self.transmit(&beat);
            } else {
                trace!("Heartbeat skipped while {}", self.state);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Internal Handlers
    // ------------------------------------------------------------------------

    fn open_transport(&mut self, now: Instant) {
        if let Some(mut stale) = self.transport.take() {
            debug!("Detaching transport attempt {}", stale.attempt);
            stale.link.close(CLOSE_NORMAL, SUPERSEDED_REASON);
        }
        self.heartbeat.stop();

        let attempt = self.last_attempt.next();
        self.last_attempt = attempt;
        let url = build_connect_url(&self.base_url, &self.client_id, self.options.credential());

        self.transition(LifecycleState::Connecting);
        self.emit(LifecycleEvent::Connecting.into());
        info!("Opening transport attempt {} to {}", attempt, self.base_url);

        let request = OpenRequest {
            url,
            protocols: self.options.protocols.clone(),
            attempt,
            sink: Arc::clone(&self.sink),
        };
        match self.connector.open(request) {
            Ok(link) => {
                self.transport = Some(ActiveTransport {
                    attempt,
                    link,
                    open: false,
                });
            }
            Err(err) => {
                warn!("Failed to open transport attempt {}: {}", attempt, err);
                self.emit(SessionEvent::error(err));
                self.transition(LifecycleState::Disconnected);
                if self.options.auto_reconnect {
                    self.schedule_reconnect(now);
                }
            }
        }
    }

    fn on_open(&mut self, now: Instant) {
        if let Some(transport) = self.transport.as_mut() {
            transport.open = true;
        }
        self.transition(LifecycleState::Connected);
        self.reconnect_attempts = 0;
        info!("Connected {} to {}", self.client_id, self.base_url);
        self.emit(LifecycleEvent::Connected.into());

        self.send_auth();
        self.flush_queue();
        self.heartbeat.start(now);
    }

    fn on_message(&mut self, text: &str) {
        let envelope = match self.codec.decode(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!("Dropping inbound frame: {}", err);
                return;
            }
        };
        if let Some(id) = &envelope.id {
            self.last_message_id = Some(id.clone());
        }
        if self.options.debug {
            info!("Received {} envelope", envelope.kind);
        } else {
            debug!("Received {} envelope", envelope.kind);
        }

        match envelope.kind {
            MessageType::Notification => match envelope.payload {
                Some(payload) => self.emit(PayloadEvent::Notification(payload).into()),
                None => warn!("Dropping notification without payload"),
            },
            MessageType::Heartbeat => {
                let ack = Envelope::heartbeat_ack(self.time_source.now());
                self.send(ack);
            }
            MessageType::AuthSuccess => {
                info!("Authenticated {}", self.client_id);
                self.emit(PayloadEvent::AuthSuccess(envelope.payload).into());
            }
            MessageType::AuthError => {
                warn!("Authentication rejected for {}", self.client_id);
                self.emit(PayloadEvent::AuthError(envelope.payload).into());
            }
            MessageType::Error => {
                warn!("Server reported an error");
                self.emit(PayloadEvent::ServerError(envelope.payload).into());
            }
            _ => self.emit(PayloadEvent::Message(envelope).into()),
        }
    }

    fn on_transport_error(&mut self, reason: String) {
        if self.graceful_shutdown {
            debug!("Suppressing transport error during shutdown: {}", reason);
            return;
        }
        warn!("Transport error: {}", reason);

        let opened = self.transport.as_ref().is_some_and(|t| t.open);
        let err = if opened {
            TransportError::Io { reason }
        } else {
            TransportError::ConnectFailed {
                url: self.base_url.to_string(),
                reason,
            }
        };
        self.emit(SessionEvent::error(err));
    }

    fn on_close(&mut self, code: u16, reason: String, now: Instant) {
        self.transport = None;
        self.heartbeat.stop();
        self.transition(LifecycleState::Disconnected);
        info!("Transport closed ({}: {})", code, reason);
        self.emit(LifecycleEvent::Disconnected { code, reason }.into());

        if self.graceful_shutdown || is_normal_closure(code) {
            debug!("Not reconnecting after normal closure");
            return;
        }
        if !self.options.auto_reconnect {
            debug!("Not reconnecting: auto-reconnect disabled");
            return;
        }
        self.schedule_reconnect(now);
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        let attempt = self.reconnect_attempts.saturating_add(1);
        if !self.backoff.should_retry(attempt) {
            self.transition(LifecycleState::Failed);
            warn!(
                "Giving up on {} after {} reconnect attempts",
                self.client_id, self.reconnect_attempts
            );
            self.emit(
                LifecycleEvent::ReconnectFailed {
                    attempts: self.reconnect_attempts,
                }
                .into(),
            );
            return;
        }

        let delay = self.backoff.delay(attempt);
        self.reconnect_attempts = attempt;
        self.pending_reconnect = Some(PendingReconnect {
            due: now + delay,
            attempt,
        });
        info!("{}", format_reconnect_message(attempt, delay));
        self.emit(
            LifecycleEvent::Reconnecting {
                attempt,
                delay,
                max_attempts: self.backoff.max_attempts,
            }
            .into(),
        );
    }

    fn send_auth(&mut self) {
        let Some(token) = self.options.credential().map(str::to_owned) else {
            return;
        };
        let auth = Envelope::auth(&token, &self.client_id, self.last_message_id.as_deref());
        if !self.transmit(&auth) {
            warn!("Failed to send auth envelope");
        }
    }

    fn flush_queue(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.queue);
        debug!("Flushing {} queued envelopes", pending.len());
        for envelope in pending {
            self.send(envelope);
        }
    }

    fn transmit(&mut self, envelope: &Envelope) -> bool {
        let frame = match self.codec.encode(envelope) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("Failed to encode {} envelope: {}", envelope.kind, err);
                return false;
            }
        };
        let Some(transport) = self.transport.as_mut() else {
            return false;
        };

        match transport.link.send_text(frame) {
            Ok(()) => {
                if self.options.debug {
                    info!("Sent {} envelope", envelope.kind);
                } else {
                    debug!("Sent {} envelope", envelope.kind);
                }
                true
            }
            Err(err) => {
                warn!("Failed to send {} envelope: {}", envelope.kind, err);
                false
            }
        }
    }

    fn transition(&mut self, next: LifecycleState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            warn!("Unexpected state transition {} -> {}", self.state, next);
        }
        debug!("State {} -> {}", self.state, next);
        self.state = next;
    }

    fn emit(&self, event: SessionEvent) {
        self.bus.emit(&event);
    }
}

fn signal_name(event: &TransportEvent) -> &'static str {
    match event {
        TransportEvent::Opened => "open",
        TransportEvent::Message(_) => "message",
        TransportEvent::Error(_) => "error",
        TransportEvent::Closed { .. } => "close",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::transport::discard_sink;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct NullLink;

    impl TransportLink for NullLink {
        fn send_text(&mut self, _frame: String) -> Result<(), TransportError> {
            Ok(())
        }

        fn close(&mut self, _code: u16, _reason: &str) {}
    }

    struct NullConnector;

    impl Connector for NullConnector {
        fn open(&mut self, _request: OpenRequest) -> Result<Box<dyn TransportLink>, TransportError> {
            Ok(Box::new(NullLink))
        }
    }

    struct RefusingConnector;

    impl Connector for RefusingConnector {
        fn open(&mut self, _request: OpenRequest) -> Result<Box<dyn TransportLink>, TransportError> {
            Err(TransportError::NoRuntime)
        }
    }

    fn create_test_machine(options: SessionOptions) -> ConnectionStateMachine {
        ConnectionStateMachine::new(options, Box::new(NullConnector), discard_sink()).unwrap()
    }

    #[test]
    fn test_construction_rejects_bad_address() {
        let result = ConnectionStateMachine::new(
            SessionOptions::new("http://host/ws"),
            Box::new(NullConnector),
            discard_sink(),
        );
        assert!(matches!(result, Err(ConfigError::UnsupportedScheme { .. })));
    }

    #[test]
    fn test_configured_client_id_is_used() {
        let machine =
            create_test_machine(SessionOptions::new("wss://host/ws").with_client_id("client-fixed"));
        assert_eq!(machine.client_id().as_str(), "client-fixed");
    }

    #[test]
    fn test_initialize_without_token_stays_initial() {
        let mut machine = create_test_machine(SessionOptions::new("wss://host/ws"));
        machine.initialize(Instant::now());
        assert_eq!(machine.state(), LifecycleState::Initial);
        assert!(!machine.has_transport());
    }

    #[test]
    fn test_initialize_respects_auto_connect_flag() {
        let mut machine = create_test_machine(
            SessionOptions::new("wss://host/ws")
                .with_token("t1")
                .with_auto_connect(false),
        );
        machine.initialize(Instant::now());
        assert_eq!(machine.state(), LifecycleState::Initial);

        machine.connect(Instant::now());
        assert_eq!(machine.state(), LifecycleState::Connecting);
    }

    #[test]
    fn test_sync_open_failure_schedules_retry() {
        let mut machine = ConnectionStateMachine::new(
            SessionOptions::new("wss://host/ws").with_token("t1"),
            Box::new(RefusingConnector),
            discard_sink(),
        )
        .unwrap();
        let errors = Arc::new(Mutex::new(0));
        let errors_clone = Arc::clone(&errors);
        machine.bus_mut().on(EventKind::Error, move |_| {
            *errors_clone.lock().unwrap() += 1;
        });

        let now = Instant::now();
        machine.connect(now);
        assert_eq!(machine.state(), LifecycleState::Disconnected);
        assert_eq!(*errors.lock().unwrap(), 1);
        assert_eq!(
            machine.pending_reconnect(),
            Some(PendingReconnect {
                due: now + Duration::from_millis(1000),
                attempt: 1
            })
        );
    }

    #[test]
    fn test_next_deadline_picks_earliest() {
        let mut machine = create_test_machine(
            SessionOptions::new("wss://host/ws")
                .with_token("t1")
                .with_heartbeat_interval_ms(500),
        );
        let now = Instant::now();
        assert_eq!(machine.next_deadline(), None);

        machine.connect(now);
        let attempt = machine.transport.as_ref().map(|t| t.attempt).unwrap();
        machine.handle_transport(TransportSignal::new(attempt, TransportEvent::Opened), now);
        assert_eq!(machine.next_deadline(), Some(now + Duration::from_millis(500)));
    }

    #[test]
    fn test_enabling_heartbeat_while_connected_arms_monitor() {
        let mut machine = create_test_machine(
            SessionOptions::new("wss://host/ws")
                .with_token("t1")
                .with_heartbeat_interval_ms(0),
        );
        let now = Instant::now();
        machine.connect(now);
        let attempt = machine.transport.as_ref().map(|t| t.attempt).unwrap();
        machine.handle_transport(TransportSignal::new(attempt, TransportEvent::Opened), now);
        assert!(!machine.heartbeat().is_running());

        let later = now + Duration::from_secs(5);
        let update = SessionOptionsUpdate {
            heartbeat_interval_ms: Some(1_000),
            ..SessionOptionsUpdate::default()
        };
        machine.update_options(update, later).unwrap();
        assert_eq!(machine.next_deadline(), Some(later + Duration::from_millis(1000)));

        machine.on_timer(later + Duration::from_millis(1000));
        assert_eq!(machine.heartbeat().beats(), 1);
    }

    #[test]
    fn test_snapshot_reflects_queue() {
        let mut machine = create_test_machine(SessionOptions::new("wss://host/ws"));
        assert!(!machine.send(Envelope::bare("chat")));
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.queued, 1);
        assert!(!snapshot.connected);
        assert_eq!(snapshot.state, LifecycleState::Initial);
    }
}
