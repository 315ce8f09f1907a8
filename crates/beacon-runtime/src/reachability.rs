//! Reachability by periodic TCP probes
//!
//! Hosts have no ambient online/offline signal, so this source opens a TCP
//! connection to the session's server on an interval and reports when the
//! outcome flips.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use beacon_core::{validate_address, Reachability, ReachabilityCallback, ReachabilitySubscription};

#[derive(Debug, Clone)]
pub struct TcpProbeReachability {
    target: String,
    interval: Duration,
    timeout: Duration,
    online: Arc<AtomicBool>,
}

impl TcpProbeReachability {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

    /// Probe `target` (`host:port`)
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            interval: Self::DEFAULT_INTERVAL,
            timeout: Self::DEFAULT_TIMEOUT,
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Probe the host and port of a session address
    pub fn for_session_url(address: &str) -> Option<Self> {
        let url = validate_address(address).ok()?;
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        Some(Self::new(format!("{host}:{port}")))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

async fn probe(target: &str, limit: Duration) -> bool {
    matches!(timeout(limit, TcpStream::connect(target)).await, Ok(Ok(_)))
}

impl Reachability for TcpProbeReachability {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn subscribe(
        &self,
        on_online: ReachabilityCallback,
        on_offline: ReachabilityCallback,
    ) -> ReachabilitySubscription {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime available, reachability probing disabled");
            return ReachabilitySubscription::empty();
        };

        let target = self.target.clone();
        let period = self.interval;
        let limit = self.timeout;
        let online = Arc::clone(&self.online);
        let task = runtime.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = probe(&target, limit).await;
                let was_reachable = online.swap(reachable, Ordering::SeqCst);
                if reachable == was_reachable {
                    continue;
                }
                if reachable {
                    info!("{} reachable again", target);
                    on_online();
                } else {
                    info!("{} unreachable", target);
                    on_offline();
                }
            }
        });

        debug!("Probing {} every {:?}", self.target, self.interval);
        ReachabilitySubscription::new(move || task.abort())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::net::TcpListener;

    #[test]
    fn test_target_from_session_url() {
        let probe = TcpProbeReachability::for_session_url("wss://example.com/ws").unwrap();
        assert_eq!(probe.target(), "example.com:443");

        let probe = TcpProbeReachability::for_session_url("ws://127.0.0.1:9001/ws").unwrap();
        assert_eq!(probe.target(), "127.0.0.1:9001");

        assert!(TcpProbeReachability::for_session_url("http://example.com/ws").is_none());
    }

    #[tokio::test]
    async fn test_probe_detects_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(probe(&addr.to_string(), Duration::from_secs(1)).await);

        drop(listener);
        assert!(!probe(&addr.to_string(), Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_reports_loss_of_reachability() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let offline = Arc::new(AtomicUsize::new(0));
        let offline_clone = Arc::clone(&offline);
        let source = TcpProbeReachability::new(addr.to_string())
            .with_interval(Duration::from_millis(20))
            .with_timeout(Duration::from_millis(200));
        let _subscription = source.subscribe(
            Arc::new(|| {}),
            Arc::new(move || {
                offline_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::timeout(Duration::from_secs(2), async {
            while offline.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(!source.is_online());
    }
}
