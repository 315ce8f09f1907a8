//! Command handlers for the Beacon CLI

use serde_json::Value;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use beacon_core::{
    format_reconnect_message, Envelope, EventKind, LifecycleEvent, LifecycleState,
    NoopReachability, PayloadEvent, Reachability, SessionError, SessionEvent,
};
use beacon_runtime::{SessionBuilder, SessionHandle, TcpProbeReachability};

use crate::cli::Commands;
use crate::config::AppConfig;
use crate::error::{CliError, Result};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(command: Commands, config: AppConfig) -> Result<()> {
        match command {
            Commands::Listen { events, count } => {
                Self::handle_listen_command(config, events, count).await
            }
            Commands::Send { kind, payload } => {
                Self::handle_send_command(config, kind, payload).await
            }
            Commands::Config => Self::handle_config_command(),
        }
    }

    /// Print events until interrupted, the count is reached or reconnecting gives up
    async fn handle_listen_command(
        config: AppConfig,
        events: Vec<String>,
        count: Option<usize>,
    ) -> Result<()> {
        let filter = parse_event_kinds(&events)?;
        let handle = Self::open_session(&config)?;
        let mut stream = handle.events(&EventKind::ALL);
        handle.connect();

        info!("Listening on {}... Press Ctrl+C to stop", config.session.url);
        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(interrupt);

        let mut printed = 0usize;
        let outcome = loop {
            tokio::select! {
                event = stream.recv() => {
                    let Some(event) = event else {
                        break Err(SessionError::channel("session stopped").into());
                    };
                    if filter.contains(&event.kind()) {
                        println!("{}", format_event(&event));
                        printed += 1;
                    }
                    if let SessionEvent::Lifecycle(LifecycleEvent::ReconnectFailed { attempts }) = event {
                        break Err(SessionError::ReconnectExhausted { attempts }.into());
                    }
                    if count.is_some_and(|limit| printed >= limit) {
                        debug!("Printed {} events, stopping", printed);
                        break Ok(());
                    }
                }
                _ = &mut interrupt => {
                    info!("Interrupted, closing session");
                    break Ok(());
                }
            }
        };

        handle.close().await;
        handle.destroy().await;
        outcome
    }

    /// Connect, send one envelope and close
    async fn handle_send_command(config: AppConfig, kind: String, payload: String) -> Result<()> {
        let payload = parse_payload(&payload);
        let handle = Self::open_session(&config)?;
        handle.connect();

        let connected = timeout(
            config.cli.connect_timeout(),
            handle.wait_for_state(LifecycleState::Connected),
        )
        .await;
        let result = match connected {
            Ok(Ok(())) => {
                if handle.send(Envelope::new(kind.as_str(), payload)).await {
                    println!("Sent {} envelope", kind);
                    Ok(())
                } else {
                    Err(SessionError::NotConnected.into())
                }
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(CliError::Timeout(format!(
                "not connected to {} after {}s",
                config.session.url, config.cli.connect_timeout_secs
            ))),
        };

        handle.close().await;
        handle.destroy().await;
        result
    }

    fn handle_config_command() -> Result<()> {
        print!("{}", AppConfig::example().to_toml_string()?);
        Ok(())
    }

    fn open_session(config: &AppConfig) -> Result<SessionHandle> {
        config.validate()?;
        if config.session.credential().is_none() {
            return Err(CliError::Config(
                "No credential; set session.auth_token, BEACON_TOKEN or --token".to_string(),
            ));
        }

        // Connect explicitly once subscribers are in place
        let options = config.session.clone().with_auto_connect(false);
        let handle = SessionBuilder::new(options)
            .reachability(Self::reachability(config))
            .spawn()?;
        Ok(handle)
    }

    fn reachability(config: &AppConfig) -> Arc<dyn Reachability> {
        if !config.cli.probe_network {
            return Arc::new(NoopReachability);
        }
        match TcpProbeReachability::for_session_url(&config.session.url) {
            Some(probe) => {
                info!("Probing {} for reachability", probe.target());
                Arc::new(probe.with_interval(config.cli.probe_interval()))
            }
            None => {
                warn!("Cannot derive a probe target from {}", config.session.url);
                Arc::new(NoopReachability)
            }
        }
    }
}

/// Event kinds named on the command line; all kinds when none are given
pub fn parse_event_kinds(names: &[String]) -> Result<Vec<EventKind>> {
    if names.is_empty() {
        return Ok(EventKind::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| {
            EventKind::from_name(name)
                .ok_or_else(|| CliError::Config(format!("Unknown event kind: {}", name)))
        })
        .collect()
}

/// JSON if it parses, otherwise the raw text as a string
pub fn parse_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn with_payload(name: &str, payload: &Option<Value>) -> String {
    match payload {
        Some(payload) => format!("{} {}", name, payload),
        None => name.to_string(),
    }
}

/// One-line rendering of an event
pub fn format_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Lifecycle(event) => match event {
            LifecycleEvent::Connecting => "connecting".to_string(),
            LifecycleEvent::Connected => "connected".to_string(),
            LifecycleEvent::Disconnected { code, reason } if reason.is_empty() => {
                format!("disconnected ({})", code)
            }
            LifecycleEvent::Disconnected { code, reason } => {
                format!("disconnected ({}): {}", code, reason)
            }
            LifecycleEvent::Reconnecting {
                attempt,
                delay,
                max_attempts,
            } => format!(
                "reconnecting: {} (max {})",
                format_reconnect_message(*attempt, *delay),
                max_attempts
            ),
            LifecycleEvent::ReconnectFailed { attempts } => {
                format!("reconnect_failed after {} attempts", attempts)
            }
            LifecycleEvent::Error(err) => format!("error: {}", err),
        },
        SessionEvent::Payload(event) => match event {
            PayloadEvent::Notification(payload) => format!("notification {}", payload),
            PayloadEvent::AuthSuccess(payload) => with_payload("auth_success", payload),
            PayloadEvent::AuthError(payload) => with_payload("auth_error", payload),
            PayloadEvent::ServerError(payload) => with_payload("server_error", payload),
            PayloadEvent::Message(envelope) => with_payload(envelope.kind.as_str(), &envelope.payload),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::TransportError;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_event_kinds_default_to_all() {
        assert_eq!(parse_event_kinds(&[]).unwrap().len(), EventKind::ALL.len());

        let kinds =
            parse_event_kinds(&["notification".to_string(), "reconnect_failed".to_string()])
                .unwrap();
        assert_eq!(kinds, vec![EventKind::Notification, EventKind::ReconnectFailed]);

        assert!(parse_event_kinds(&["bogus".to_string()]).is_err());
    }

    #[test]
    fn test_payload_falls_back_to_text() {
        assert_eq!(parse_payload(r#"{"text":"hi"}"#), json!({"text": "hi"}));
        assert_eq!(parse_payload("42"), json!(42));
        assert_eq!(parse_payload("hello there"), json!("hello there"));
    }

    #[test]
    fn test_format_lifecycle_events() {
        let reconnecting = SessionEvent::from(LifecycleEvent::Reconnecting {
            attempt: 2,
            delay: Duration::from_millis(2000),
            max_attempts: 5,
        });
        assert_eq!(
            format_event(&reconnecting),
            "reconnecting: Reconnection attempt 2 in 2000ms (max 5)"
        );

        let closed = SessionEvent::from(LifecycleEvent::Disconnected {
            code: 1000,
            reason: "Client disconnect".to_string(),
        });
        assert_eq!(format_event(&closed), "disconnected (1000): Client disconnect");

        let abnormal = SessionEvent::from(LifecycleEvent::Disconnected {
            code: 1006,
            reason: String::new(),
        });
        assert_eq!(format_event(&abnormal), "disconnected (1006)");

        let error = SessionEvent::error(TransportError::Closed);
        assert!(format_event(&error).starts_with("error: "));
    }

    #[test]
    fn test_format_payload_events() {
        let notification = SessionEvent::from(PayloadEvent::Notification(json!({"n": 1})));
        assert_eq!(format_event(&notification), r#"notification {"n":1}"#);

        let auth = SessionEvent::from(PayloadEvent::AuthSuccess(None));
        assert_eq!(format_event(&auth), "auth_success");

        let other = SessionEvent::from(PayloadEvent::Message(Envelope::new("chat", json!("hi"))));
        assert_eq!(format_event(&other), r#"chat "hi""#);
    }
}
