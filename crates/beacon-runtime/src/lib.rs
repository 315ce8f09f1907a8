//! Beacon Runtime
//!
//! Tokio runtime for the Beacon session client. A session runs as a single
//! task owning its [`beacon_core::ConnectionStateMachine`]; applications talk
//! to it through a cloneable [`SessionHandle`], usually obtained from the
//! process-wide [`SessionRegistry`].

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod reachability;
pub mod registry;
pub mod session;
pub mod websocket;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use reachability::TcpProbeReachability;
pub use registry::{ConnectorFactory, SessionRegistry};
pub use session::{ReleaseHook, SessionBuilder, SessionHandle};
pub use websocket::{WebSocketConnector, WebSocketLink};

pub use beacon_core;
