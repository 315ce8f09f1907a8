//! Session task and its handle
//!
//! One tokio task owns the [`ConnectionStateMachine`] and is the only place
//! session state changes. It multiplexes four inputs: commands from
//! [`SessionHandle`]s, transport signals, reachability changes and the
//! machine's next timer deadline. Handles observe state through a `watch`
//! snapshot, so reading it never waits on the task.

use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use beacon_core::{
    ClientId, ConnectionStateMachine, Connector, Envelope, EventCallback, EventKind,
    LifecycleState, NetworkAwareness, NoopReachability, Reachability, ReachabilitySubscription,
    Result, SessionError, SessionEvent, SessionOptions, SessionOptionsUpdate, SessionSnapshot,
    SubscriptionId, TimeSource, TransportSignal, TransportSink, CLOSE_NORMAL,
    DEFAULT_DISCONNECT_REASON,
};

use crate::websocket::WebSocketConnector;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Callback run once a session has been destroyed, given its instance id
pub type ReleaseHook = Arc<dyn Fn(u64) + Send + Sync>;

// ----------------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------------

enum Command {
    Connect,
    Disconnect {
        code: u16,
        reason: String,
        ack: oneshot::Sender<()>,
    },
    Send {
        envelope: Envelope,
        reply: Option<oneshot::Sender<bool>>,
    },
    SendNotification {
        payload: Value,
        reply: oneshot::Sender<Result<()>>,
    },
    Subscribe {
        kind: EventKind,
        id: SubscriptionId,
        callback: EventCallback,
    },
    Unsubscribe {
        kind: EventKind,
        id: SubscriptionId,
    },
    UpdateOptions {
        update: SessionOptionsUpdate,
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    Destroy {
        ack: oneshot::Sender<()>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Connect => "connect",
            Command::Disconnect { .. } => "disconnect",
            Command::Send { .. } => "send",
            Command::SendNotification { .. } => "send_notification",
            Command::Subscribe { .. } => "subscribe",
            Command::Unsubscribe { .. } => "unsubscribe",
            Command::UpdateOptions { .. } => "update_options",
            Command::Destroy { .. } => "destroy",
        }
    }
}

// ----------------------------------------------------------------------------
// Session Builder
// ----------------------------------------------------------------------------

/// Configures and spawns a session task
pub struct SessionBuilder {
    options: SessionOptions,
    connector: Box<dyn Connector>,
    reachability: Arc<dyn Reachability>,
    time_source: Option<Box<dyn TimeSource>>,
    release: Option<ReleaseHook>,
}

impl SessionBuilder {
    /// Builder with the WebSocket connector and no reachability source
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            connector: Box::new(WebSocketConnector::new()),
            reachability: Arc::new(NoopReachability),
            time_source: None,
            release: None,
        }
    }

    pub fn connector(mut self, connector: Box<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn reachability(mut self, reachability: Arc<dyn Reachability>) -> Self {
        self.reachability = reachability;
        self
    }

    pub fn time_source(mut self, time_source: Box<dyn TimeSource>) -> Self {
        self.time_source = Some(time_source);
        self
    }

    pub fn on_release(mut self, release: ReleaseHook) -> Self {
        self.release = Some(release);
        self
    }

    /// Validate the options and start the session task
    ///
    /// Must be called from within a tokio runtime. Auto-connect, when
    /// configured, begins as soon as the task runs.
    pub fn spawn(self) -> Result<SessionHandle> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel::<TransportSignal>();
        let (network_tx, network_rx) = mpsc::unbounded_channel::<bool>();

        let sink: TransportSink = Arc::new(move |signal| {
            let _ = signal_tx.send(signal);
        });
        let mut machine = ConnectionStateMachine::new(self.options, self.connector, sink)?;
        if let Some(time_source) = self.time_source {
            machine = machine.with_time_source(time_source);
        }

        let client_id = machine.client_id().clone();
        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());

        let online_tx = network_tx.clone();
        let subscription = self.reachability.subscribe(
            Arc::new(move || {
                let _ = online_tx.send(true);
            }),
            Arc::new(move || {
                let _ = network_tx.send(false);
            }),
        );

        let task = SessionTask {
            machine,
            commands: command_rx,
            signals: signal_rx,
            network: network_rx,
            snapshot: snapshot_tx,
            reachability: self.reachability,
            subscription: Some(subscription),
            running: true,
        };
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SessionError::from(beacon_core::TransportError::NoRuntime))?;
        runtime.spawn(task.run());

        let instance = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
        info!("Session {} started as instance {}", client_id, instance);
        Ok(SessionHandle {
            instance,
            client_id,
            commands: command_tx,
            snapshot: snapshot_rx,
            next_subscription: Arc::new(AtomicU64::new(0)),
            release: self.release,
        })
    }
}

// ----------------------------------------------------------------------------
// Session Task
// ----------------------------------------------------------------------------

struct SessionTask {
    machine: ConnectionStateMachine,
    commands: mpsc::UnboundedReceiver<Command>,
    signals: mpsc::UnboundedReceiver<TransportSignal>,
    network: mpsc::UnboundedReceiver<bool>,
    snapshot: watch::Sender<SessionSnapshot>,
    reachability: Arc<dyn Reachability>,
    subscription: Option<ReachabilitySubscription>,
    running: bool,
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

async fn sleep_until_deadline(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(Instant::from_std(deadline)).await,
        None => std::future::pending::<()>().await,
    }
}

impl SessionTask {
    async fn run(mut self) {
        debug!("Session task for {} starting", self.machine.client_id());
        self.machine.initialize(now());
        NetworkAwareness::on_attach(&mut self.machine, self.reachability.as_ref());
        self.publish();

        while self.running {
            let deadline = self.machine.next_deadline();
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        info!("All handles dropped, shutting down session {}", self.machine.client_id());
                        self.shutdown();
                    }
                },
                Some(signal) = self.signals.recv() => {
                    self.machine.handle_transport(signal, now());
                }
                Some(online) = self.network.recv() => {
                    if online {
                        NetworkAwareness::on_online(&mut self.machine, now());
                    } else {
                        NetworkAwareness::on_offline(&mut self.machine);
                    }
                }
                _ = sleep_until_deadline(deadline) => {
                    self.machine.on_timer(now());
                }
            }
            self.publish();
        }
        debug!("Session task for {} stopped", self.machine.client_id());
    }

    fn handle_command(&mut self, command: Command) {
        debug!("Session command: {}", command.name());
        match command {
            Command::Connect => self.machine.connect(now()),
            Command::Disconnect { code, reason, ack } => {
                self.machine.disconnect(code, &reason);
                self.publish();
                let _ = ack.send(());
            }
            Command::Send { envelope, reply } => {
                let sent = self.machine.send(envelope);
                self.publish();
                if let Some(reply) = reply {
                    let _ = reply.send(sent);
                }
            }
            Command::SendNotification { payload, reply } => {
                let result = self.machine.send_notification(payload);
                let _ = reply.send(result);
            }
            Command::Subscribe { kind, id, callback } => {
                self.machine.bus_mut().on_with_id(kind, id, callback);
            }
            Command::Unsubscribe { kind, id } => {
                self.machine.bus_mut().off(kind, id);
            }
            Command::UpdateOptions { update, reply } => {
                let result = self
                    .machine
                    .update_options(update, now())
                    .map_err(SessionError::from);
                self.publish();
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Command::Destroy { ack } => {
                self.shutdown();
                self.publish();
                let _ = ack.send(());
            }
        }
    }

    fn shutdown(&mut self) {
        self.machine.destroy();
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.running = false;
    }

    fn publish(&self) {
        let next = self.machine.snapshot();
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

// ----------------------------------------------------------------------------
// Session Handle
// ----------------------------------------------------------------------------

/// Cloneable handle to a running session
///
/// Every request is forwarded to the session task in order. Requests that
/// report an outcome wait for the task to process them.
#[derive(Clone)]
pub struct SessionHandle {
    instance: u64,
    client_id: ClientId,
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
    next_subscription: Arc<AtomicU64>,
    release: Option<ReleaseHook>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("instance", &self.instance)
            .field("client_id", &self.client_id)
            .field("snapshot", &*self.snapshot.borrow())
            .finish()
    }
}

impl SessionHandle {
    /// Process-unique number of the session behind this handle
    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.snapshot.borrow().state
    }

    pub fn is_connected(&self) -> bool {
        self.snapshot.borrow().connected
    }

    pub fn is_connecting(&self) -> bool {
        self.state() == LifecycleState::Connecting
    }

    /// Whether the session task is still running
    pub fn is_alive(&self) -> bool {
        !self.commands.is_closed()
    }

    fn dispatch(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|e| SessionError::channel(format!("{} after shutdown", e.0.name())))
    }

    /// Request a connection; returns without waiting for it
    pub fn connect(&self) {
        if let Err(e) = self.dispatch(Command::Connect) {
            warn!("Connect ignored: {}", e);
        }
    }

    /// Close the transport on purpose
    ///
    /// Resolves once pending reconnect and heartbeat timers are cancelled.
    pub async fn disconnect(&self, code: u16, reason: &str) {
        let (ack, done) = oneshot::channel();
        let command = Command::Disconnect {
            code,
            reason: reason.to_string(),
            ack,
        };
        if self.dispatch(command).is_ok() {
            let _ = done.await;
        }
    }

    /// [`disconnect`](Self::disconnect) with a normal closure
    pub async fn close(&self) {
        self.disconnect(CLOSE_NORMAL, DEFAULT_DISCONNECT_REASON).await;
    }

    /// Transmit now or queue until connected; true only if transmitted
    pub async fn send(&self, envelope: Envelope) -> bool {
        let (reply, result) = oneshot::channel();
        let command = Command::Send {
            envelope,
            reply: Some(reply),
        };
        if self.dispatch(command).is_err() {
            return false;
        }
        result.await.unwrap_or(false)
    }

    /// Fire-and-forget [`send`](Self::send), usable from event callbacks
    pub fn post(&self, envelope: Envelope) {
        if let Err(e) = self.dispatch(Command::Send {
            envelope,
            reply: None,
        }) {
            warn!("Envelope dropped: {}", e);
        }
    }

    /// Send a notification immediately; fails instead of queueing
    pub async fn send_notification(&self, payload: Value) -> Result<()> {
        let (reply, result) = oneshot::channel();
        self.dispatch(Command::SendNotification { payload, reply })?;
        result
            .await
            .map_err(|_| SessionError::channel("session stopped before replying"))?
    }

    /// Subscribe `callback` to events of `kind`
    ///
    /// Callbacks run on the session task and must not block.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new(self.next_subscription.fetch_add(1, Ordering::Relaxed) + 1);
        let _ = self.dispatch(Command::Subscribe {
            kind,
            id,
            callback: Arc::new(callback),
        });
        id
    }

    pub fn off(&self, kind: EventKind, id: SubscriptionId) {
        let _ = self.dispatch(Command::Unsubscribe { kind, id });
    }

    /// Stream of events of the given kinds
    pub fn events(&self, kinds: &[EventKind]) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        for kind in kinds {
            let tx = tx.clone();
            self.on(*kind, move |event| {
                let _ = tx.send(event.clone());
            });
        }
        rx
    }

    /// Merge option changes into the running session
    pub async fn update_options(&self, update: SessionOptionsUpdate) -> Result<()> {
        let (reply, result) = oneshot::channel();
        self.dispatch(Command::UpdateOptions {
            update,
            reply: Some(reply),
        })?;
        result
            .await
            .map_err(|_| SessionError::channel("session stopped before replying"))?
    }

    /// Fire-and-forget [`update_options`](Self::update_options)
    pub fn post_options(&self, update: SessionOptionsUpdate) {
        if let Err(e) = self.dispatch(Command::UpdateOptions {
            update,
            reply: None,
        }) {
            warn!("Options update dropped: {}", e);
        }
    }

    /// Wait until the session reaches `target`
    pub async fn wait_for_state(&self, target: LifecycleState) -> Result<()> {
        let mut snapshot = self.snapshot.clone();
        snapshot
            .wait_for(|s| s.state == target)
            .await
            .map(|_| ())
            .map_err(|_| SessionError::channel("session stopped"))
    }

    /// Tear the session down and release its registry slot
    pub async fn destroy(&self) {
        let (ack, done) = oneshot::channel();
        if self.dispatch(Command::Destroy { ack }).is_ok() {
            let _ = done.await;
        }
        if let Some(release) = &self.release {
            release(self.instance);
        }
    }
}
