//! Process-wide session registry
//!
//! Holds at most one live session. The first request must carry options;
//! later requests return the same session and merge any options they carry
//! into it. Destroying the session frees the slot for a fresh one.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use tracing::{debug, info};

use beacon_core::{
    ConfigError, Connector, NoopReachability, Reachability, Result, SessionError, SessionOptions,
    SessionOptionsUpdate,
};

use crate::session::{ReleaseHook, SessionBuilder, SessionHandle};
use crate::websocket::WebSocketConnector;

/// Produces a fresh connector for each new session
pub type ConnectorFactory = Arc<dyn Fn() -> Box<dyn Connector> + Send + Sync>;

type Slot = Arc<Mutex<Option<SessionHandle>>>;

static GLOBAL: OnceLock<SessionRegistry> = OnceLock::new();

pub struct SessionRegistry {
    slot: Slot,
    connector_factory: ConnectorFactory,
    reachability: Arc<dyn Reachability>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("current", &self.current().map(|h| h.instance()))
            .finish()
    }
}

impl SessionRegistry {
    /// Registry creating WebSocket sessions without reachability tracking
    pub fn new() -> Self {
        Self::with_components(
            Arc::new(|| Box::new(WebSocketConnector::new()) as Box<dyn Connector>),
            Arc::new(NoopReachability),
        )
    }

    pub fn with_components(
        connector_factory: ConnectorFactory,
        reachability: Arc<dyn Reachability>,
    ) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            connector_factory,
            reachability,
        }
    }

    /// The registry shared by the whole process
    pub fn global() -> &'static SessionRegistry {
        GLOBAL.get_or_init(SessionRegistry::new)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<SessionHandle>>> {
        self.slot
            .lock()
            .map_err(|_| SessionError::channel("session registry lock poisoned"))
    }

    fn release_hook(&self) -> ReleaseHook {
        let slot: Weak<Mutex<Option<SessionHandle>>> = Arc::downgrade(&self.slot);
        Arc::new(move |instance| {
            let Some(slot) = slot.upgrade() else {
                return;
            };
            if let Ok(mut current) = slot.lock() {
                if current.as_ref().is_some_and(|h| h.instance() == instance) {
                    debug!("Releasing registry slot of instance {}", instance);
                    *current = None;
                }
            };
        })
    }

    /// Return the live session, creating it from `options` if there is none
    ///
    /// Options passed while a session exists are merged into it in place;
    /// only the address, the credential and fields set away from their
    /// defaults are applied.
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_instance(&self, options: Option<SessionOptions>) -> Result<SessionHandle> {
        let mut current = self.lock()?;

        if let Some(handle) = current.as_ref().filter(|h| h.is_alive()) {
            if let Some(options) = options {
                debug!("Updating options of session {}", handle.client_id());
                handle.post_options(SessionOptionsUpdate::from(options));
            }
            return Ok(handle.clone());
        }

        let options = options.ok_or(ConfigError::MissingOptions)?;
        let handle = SessionBuilder::new(options)
            .connector((self.connector_factory)())
            .reachability(Arc::clone(&self.reachability))
            .on_release(self.release_hook())
            .spawn()?;
        info!("Registered session {}", handle.client_id());
        *current = Some(handle.clone());
        Ok(handle)
    }

    /// The live session, if any
    pub fn current(&self) -> Option<SessionHandle> {
        self.lock()
            .ok()
            .and_then(|current| current.as_ref().filter(|h| h.is_alive()).cloned())
    }

    /// Destroy the live session and clear the slot
    pub async fn destroy(&self) {
        let handle = match self.lock() {
            Ok(mut current) => current.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            handle.destroy().await;
        }
    }
}
