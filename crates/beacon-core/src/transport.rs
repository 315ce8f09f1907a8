//! Transport seam between the state machine and a concrete connection
//!
//! A [`Connector`] opens one transport per attempt and returns a
//! [`TransportLink`] for outbound frames immediately. Everything the transport
//! observes afterwards (open, inbound text, errors, close) is reported as a
//! [`TransportSignal`] through the sink handed over in the [`OpenRequest`].

use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::errors::TransportError;
use crate::types::AttemptId;

// ----------------------------------------------------------------------------
// Close Codes
// ----------------------------------------------------------------------------

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_GOING_AWAY: u16 = 1001;
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Whether a close with `code` ends the session on purpose
pub fn is_normal_closure(code: u16) -> bool {
    matches!(code, CLOSE_NORMAL | CLOSE_GOING_AWAY)
}

// ----------------------------------------------------------------------------
// Signals
// ----------------------------------------------------------------------------

/// Something a transport observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    /// A failure; always followed by `Closed`
    Error(String),
    Closed { code: u16, reason: String },
}

/// A transport event tagged with the attempt that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSignal {
    pub attempt: AttemptId,
    pub event: TransportEvent,
}

impl TransportSignal {
    pub fn new(attempt: AttemptId, event: TransportEvent) -> Self {
        Self { attempt, event }
    }
}

/// Receiver of transport signals
pub type TransportSink = Arc<dyn Fn(TransportSignal) + Send + Sync>;

/// Sink that discards everything
pub fn discard_sink() -> TransportSink {
    Arc::new(|_| {})
}

// ----------------------------------------------------------------------------
// Connector Traits
// ----------------------------------------------------------------------------

/// Parameters of one transport-open attempt
#[derive(Clone)]
pub struct OpenRequest {
    pub url: Url,
    pub protocols: Vec<String>,
    pub attempt: AttemptId,
    pub sink: TransportSink,
}

impl OpenRequest {
    /// Report an event for this attempt
    pub fn report(&self, event: TransportEvent) {
        (self.sink)(TransportSignal::new(self.attempt, event));
    }
}

impl fmt::Debug for OpenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRequest")
            .field("url", &self.url.as_str())
            .field("protocols", &self.protocols)
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// Outbound half of an open transport
pub trait TransportLink: Send {
    fn send_text(&mut self, frame: String) -> Result<(), TransportError>;

    /// Begin closing; later signals of this attempt may be ignored
    fn close(&mut self, code: u16, reason: &str);
}

/// Factory of transports
pub trait Connector: Send {
    /// Start opening a transport
    ///
    /// Must not block. Completion or failure is reported through
    /// `request.sink`; an `Err` here means nothing was started.
    fn open(&mut self, request: OpenRequest) -> Result<Box<dyn TransportLink>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_normal_closure_codes() {
        assert!(is_normal_closure(CLOSE_NORMAL));
        assert!(is_normal_closure(CLOSE_GOING_AWAY));
        assert!(!is_normal_closure(CLOSE_ABNORMAL));
        assert!(!is_normal_closure(4000));
    }

    #[test]
    fn test_report_tags_attempt() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let request = OpenRequest {
            url: Url::parse("wss://host/ws").unwrap(),
            protocols: Vec::new(),
            attempt: AttemptId::new(4),
            sink: Arc::new(move |signal| seen_clone.lock().unwrap().push(signal)),
        };

        request.report(TransportEvent::Opened);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![TransportSignal::new(AttemptId::new(4), TransportEvent::Opened)]
        );
    }
}
