//! Session lifecycle states and the transitions allowed between them

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a session's transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Created, never connected
    Initial,
    /// Transport open requested, not yet confirmed
    Connecting,
    /// Transport open; envelopes flow
    Connected,
    /// Graceful teardown in progress
    Disconnecting,
    /// No transport; a reconnect may be pending
    Disconnected,
    /// Reconnect budget exhausted; waits for an explicit connect
    Failed,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::Initial
    }
}

impl LifecycleState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
        }
    }

    /// Whether moving from `self` to `next` is part of the lifecycle
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Initial, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnecting)
                | (Connecting, Disconnected)
                | (Connecting, Failed)
                | (Connected, Disconnecting)
                | (Connected, Disconnected)
                | (Disconnecting, Disconnected)
                | (Disconnected, Connecting)
                | (Disconnected, Failed)
                | (Failed, Connecting)
        )
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Connecting or connected
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
