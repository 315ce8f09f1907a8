//! WebSocket transport backed by `tokio-tungstenite`
//!
//! Each open attempt runs in its own socket task. The task owns both halves
//! of the stream, forwards outbound frames from its [`WebSocketLink`] and
//! reports everything it sees through the attempt's sink. A failed handshake
//! is reported as an error followed by an abnormal close.

use futures::{SinkExt, StreamExt};
use std::borrow::Cow;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;
use tracing::{debug, trace, warn};

use beacon_core::{
    Connector, OpenRequest, TransportError, TransportEvent, TransportLink, CLOSE_ABNORMAL,
    CLOSE_NORMAL,
};

/// Commands from a link to its socket task
#[derive(Debug)]
enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

// ----------------------------------------------------------------------------
// Connector
// ----------------------------------------------------------------------------

/// Opens WebSocket transports on the current tokio runtime
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn open(&mut self, request: OpenRequest) -> Result<Box<dyn TransportLink>, TransportError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        runtime.spawn(run_socket(request, outbound_rx));
        Ok(Box::new(WebSocketLink {
            outbound: outbound_tx,
        }))
    }
}

// ----------------------------------------------------------------------------
// Link
// ----------------------------------------------------------------------------

/// Outbound half of one WebSocket attempt
///
/// Dropping the link closes the socket with a normal closure.
#[derive(Debug)]
pub struct WebSocketLink {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl TransportLink for WebSocketLink {
    fn send_text(&mut self, frame: String) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Text(frame))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self, code: u16, reason: &str) {
        let _ = self.outbound.send(Outbound::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

// ----------------------------------------------------------------------------
// Socket Task
// ----------------------------------------------------------------------------

fn build_request(
    request: &OpenRequest,
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, String> {
    let mut client_request = request
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| e.to_string())?;
    if !request.protocols.is_empty() {
        let value = HeaderValue::from_str(&request.protocols.join(", "))
            .map_err(|e| format!("invalid sub-protocol list: {e}"))?;
        client_request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", value);
    }
    Ok(client_request)
}

fn close_frame(code: u16, reason: String) -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::from(code),
        reason: Cow::Owned(reason),
    }))
}

async fn run_socket(request: OpenRequest, mut outbound: mpsc::UnboundedReceiver<Outbound>) {
    let attempt = request.attempt;
    let client_request = match build_request(&request) {
        Ok(client_request) => client_request,
        Err(reason) => {
            request.report(TransportEvent::Error(reason));
            request.report(TransportEvent::Closed {
                code: CLOSE_ABNORMAL,
                reason: "invalid connect request".to_string(),
            });
            return;
        }
    };

    let stream = match connect_async(client_request).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            debug!("Attempt {} failed to connect: {}", attempt, e);
            request.report(TransportEvent::Error(e.to_string()));
            request.report(TransportEvent::Closed {
                code: CLOSE_ABNORMAL,
                reason: "connect failed".to_string(),
            });
            return;
        }
    };
    request.report(TransportEvent::Opened);

    let (mut writer, mut reader) = stream.split();
    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(frame)) => {
                    if let Err(e) = writer.send(Message::Text(frame)).await {
                        warn!("Attempt {} write failed: {}", attempt, e);
                        request.report(TransportEvent::Error(e.to_string()));
                        request.report(TransportEvent::Closed {
                            code: CLOSE_ABNORMAL,
                            reason: "write failed".to_string(),
                        });
                        return;
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    trace!("Attempt {} closing ({})", attempt, code);
                    let _ = writer.send(close_frame(code, reason.clone())).await;
                    request.report(TransportEvent::Closed { code, reason });
                    return;
                }
                None => {
                    trace!("Attempt {} link dropped, closing", attempt);
                    let _ = writer.send(close_frame(CLOSE_NORMAL, String::new())).await;
                    return;
                }
            },
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    request.report(TransportEvent::Message(text));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => request.report(TransportEvent::Message(text)),
                    Err(_) => warn!("Attempt {} dropped a non UTF-8 binary frame", attempt),
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                        None => (CLOSE_NORMAL, String::new()),
                    };
                    debug!("Attempt {} closed by peer ({})", attempt, code);
                    request.report(TransportEvent::Closed { code, reason });
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    request.report(TransportEvent::Error(e.to_string()));
                    request.report(TransportEvent::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: "read failed".to_string(),
                    });
                    return;
                }
                None => {
                    request.report(TransportEvent::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: "stream ended".to_string(),
                    });
                    return;
                }
            },
        }
    }
}
