//! Beacon Core
//!
//! Runtime-agnostic core of a resilient, authenticated WebSocket session
//! client: the wire envelope and its codec, reconnect backoff, heartbeat
//! scheduling, the session event bus, reachability handling and the
//! [`ConnectionStateMachine`] tying them together.
//!
//! Nothing in this crate spawns tasks or sleeps. Timers are deadlines that
//! the owner of a machine polls; transports are plugged in through the
//! [`Connector`] trait.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod backoff;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod heartbeat;
pub mod machine;
pub mod network;
pub mod state;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use backoff::{calculate_backoff, format_reconnect_message, should_reconnect, BackoffPolicy};
pub use codec::MessageCodec;
pub use config::{
    build_connect_url, validate_address, ReconnectOptions, SessionOptions, SessionOptionsUpdate,
    DEFAULT_DISCONNECT_REASON,
};
pub use envelope::{Envelope, MessageType};
pub use errors::{ConfigError, ProtocolError, Result, SessionError, TransportError};
pub use events::{
    EventCallback, EventKind, LifecycleEvent, PayloadEvent, SessionEvent, SessionEventBus,
    SubscriptionId,
};
pub use heartbeat::HeartbeatMonitor;
pub use machine::{ConnectionStateMachine, PendingReconnect, SessionSnapshot};
pub use network::{
    ManualReachability, NetworkAwareness, NoopReachability, Reachability, ReachabilityCallback,
    ReachabilitySubscription, OFFLINE_REASON,
};
pub use state::LifecycleState;
pub use transport::{
    discard_sink, is_normal_closure, Connector, OpenRequest, TransportEvent, TransportLink,
    TransportSignal, TransportSink, CLOSE_ABNORMAL, CLOSE_GOING_AWAY, CLOSE_NORMAL,
};
pub use types::{AttemptId, ClientId, FixedTimeSource, SystemTimeSource, TimeSource, Timestamp};
