//! Network reachability
//!
//! A [`Reachability`] source reports when the host goes offline or comes
//! back. [`NetworkAwareness`] turns those reports into requests on the state
//! machine using only its public operations.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};

use crate::machine::ConnectionStateMachine;
use crate::state::LifecycleState;
use crate::transport::CLOSE_NORMAL;

/// Close reason used when the host loses connectivity
pub const OFFLINE_REASON: &str = "Network offline";

// ----------------------------------------------------------------------------
// Reachability Capability
// ----------------------------------------------------------------------------

/// Callback invoked on a reachability change
pub type ReachabilityCallback = Arc<dyn Fn() + Send + Sync>;

/// Registration with a reachability source
///
/// Unsubscribes when [`unsubscribe`](Self::unsubscribe) is called or on drop.
pub struct ReachabilitySubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ReachabilitySubscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Subscription with nothing to release
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for ReachabilitySubscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ReachabilitySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReachabilitySubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Source of online/offline notifications
pub trait Reachability: Send + Sync {
    /// Current best guess; sources that cannot tell report online
    fn is_online(&self) -> bool {
        true
    }

    fn subscribe(
        &self,
        on_online: ReachabilityCallback,
        on_offline: ReachabilityCallback,
    ) -> ReachabilitySubscription;
}

/// Source that never reports a change
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReachability;

impl Reachability for NoopReachability {
    fn subscribe(
        &self,
        _on_online: ReachabilityCallback,
        _on_offline: ReachabilityCallback,
    ) -> ReachabilitySubscription {
        ReachabilitySubscription::empty()
    }
}

// ----------------------------------------------------------------------------
// Manual Reachability
// ----------------------------------------------------------------------------

struct Listener {
    id: u64,
    on_online: ReachabilityCallback,
    on_offline: ReachabilityCallback,
}

struct ManualState {
    online: bool,
    next_id: u64,
    listeners: Vec<Listener>,
}

/// Reachability driven by explicit calls, for embedders and tests
#[derive(Clone)]
pub struct ManualReachability {
    inner: Arc<Mutex<ManualState>>,
}

impl Default for ManualReachability {
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Debug for ManualReachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualReachability")
            .field("online", &self.is_online())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ManualReachability {
    pub fn new(online: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualState {
                online,
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Record a new reachability; listeners are told only about changes
    pub fn set_online(&self, online: bool) {
        let callbacks: Vec<ReachabilityCallback> = {
            let Ok(mut state) = self.inner.lock() else {
                return;
            };
            if state.online == online {
                return;
            }
            state.online = online;
            state
                .listeners
                .iter()
                .map(|l| {
                    if online {
                        Arc::clone(&l.on_online)
                    } else {
                        Arc::clone(&l.on_offline)
                    }
                })
                .collect()
        };
        for callback in callbacks {
            callback();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().map_or(0, |state| state.listeners.len())
    }
}

impl Reachability for ManualReachability {
    fn is_online(&self) -> bool {
        self.inner.lock().map_or(true, |state| state.online)
    }

    fn subscribe(
        &self,
        on_online: ReachabilityCallback,
        on_offline: ReachabilityCallback,
    ) -> ReachabilitySubscription {
        let Ok(mut state) = self.inner.lock() else {
            return ReachabilitySubscription::empty();
        };
        state.next_id += 1;
        let id = state.next_id;
        state.listeners.push(Listener {
            id,
            on_online,
            on_offline,
        });

        let inner = Arc::clone(&self.inner);
        ReachabilitySubscription::new(move || {
            if let Ok(mut state) = inner.lock() {
                state.listeners.retain(|l| l.id != id);
            }
        })
    }
}

// ----------------------------------------------------------------------------
// Reconnect Policy
// ----------------------------------------------------------------------------

/// Applies reachability changes to a session
pub struct NetworkAwareness;

impl NetworkAwareness {
    /// Connectivity returned: reconnect a disconnected session
    pub fn on_online(machine: &mut ConnectionStateMachine, now: Instant) {
        if machine.state() == LifecycleState::Disconnected {
            info!("Network online, reconnecting");
            machine.connect(now);
        } else {
            debug!("Network online while {}, nothing to do", machine.state());
        }
    }

    /// Connectivity lost: close the transport without scheduling a retry
    pub fn on_offline(machine: &mut ConnectionStateMachine) {
        if machine.has_transport() || machine.state().is_active() {
            info!("Network offline, closing transport");
            machine.disconnect(CLOSE_NORMAL, OFFLINE_REASON);
        } else {
            debug!("Network offline while {}", machine.state());
        }
    }

    /// Check a freshly attached source, applying the offline policy if needed
    pub fn on_attach(machine: &mut ConnectionStateMachine, source: &dyn Reachability) {
        if !source.is_online() {
            Self::on_offline(machine);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, ReachabilityCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let callback: ReachabilityCallback = Arc::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[test]
    fn test_manual_reachability_reports_changes_only() {
        let source = ManualReachability::new(true);
        let (up, on_up) = counter();
        let (down, on_down) = counter();
        let _sub = source.subscribe(on_up, on_down);

        source.set_online(true);
        assert_eq!(down.load(Ordering::SeqCst), 0);

        source.set_online(false);
        source.set_online(false);
        assert_eq!(down.load(Ordering::SeqCst), 1);
        assert!(!source.is_online());

        source.set_online(true);
        assert_eq!(up.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let source = ManualReachability::default();
        let (down, on_down) = counter();
        let (_, on_up) = counter();

        let sub = source.subscribe(on_up, on_down);
        assert_eq!(source.listener_count(), 1);
        drop(sub);
        assert_eq!(source.listener_count(), 0);

        source.set_online(false);
        assert_eq!(down.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_explicit_unsubscribe() {
        let source = ManualReachability::default();
        let (_, on_up) = counter();
        let (_, on_down) = counter();
        source.subscribe(on_up, on_down).unsubscribe();
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn test_noop_source_is_online() {
        let (_, on_up) = counter();
        let (_, on_down) = counter();
        let source = NoopReachability;
        assert!(source.is_online());
        let _sub = source.subscribe(on_up, on_down);
    }
}
