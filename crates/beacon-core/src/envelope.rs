//! Wire envelope and its type vocabulary

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::types::{ClientId, Timestamp};

// ----------------------------------------------------------------------------
// Message Type
// ----------------------------------------------------------------------------

/// Value of an envelope's `type` field
///
/// The protocol defines a closed set of control types. Everything else is an
/// application type carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    Auth,
    AuthSuccess,
    AuthError,
    Notification,
    Heartbeat,
    HeartbeatAck,
    Error,
    Other(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Auth => "auth",
            Self::AuthSuccess => "auth_success",
            Self::AuthError => "auth_error",
            Self::Notification => "notification",
            Self::Heartbeat => "heartbeat",
            Self::HeartbeatAck => "heartbeat_ack",
            Self::Error => "error",
            Self::Other(name) => name,
        }
    }

    /// Conventional type of generic application messages
    pub fn message() -> Self {
        Self::Other("message".to_string())
    }
}

impl From<String> for MessageType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "auth" => Self::Auth,
            "auth_success" => Self::AuthSuccess,
            "auth_error" => Self::AuthError,
            "notification" => Self::Notification,
            "heartbeat" => Self::Heartbeat,
            "heartbeat_ack" => Self::HeartbeatAck,
            "error" => Self::Error,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for MessageType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<MessageType> for String {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ----------------------------------------------------------------------------
// Envelope
// ----------------------------------------------------------------------------

/// One application-level message unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Envelope {
    pub fn new(kind: impl Into<MessageType>, payload: Value) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            payload: Some(payload),
        }
    }

    /// Envelope without a payload
    pub fn bare(kind: impl Into<MessageType>) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            payload: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn notification(payload: Value) -> Self {
        Self::new(MessageType::Notification, payload)
    }

    /// Authentication handshake sent right after the transport opens
    pub fn auth(token: &str, client_id: &ClientId, last_message_id: Option<&str>) -> Self {
        let mut payload = json!({
            "token": token,
            "clientId": client_id.as_str(),
        });
        if let (Some(id), Some(map)) = (last_message_id, payload.as_object_mut()) {
            map.insert("lastMessageId".to_string(), Value::String(id.to_string()));
        }
        Self::new(MessageType::Auth, payload)
    }

    pub fn heartbeat(at: Timestamp) -> Self {
        Self::new(MessageType::Heartbeat, json!({ "timestamp": at.as_millis() }))
    }

    pub fn heartbeat_ack(at: Timestamp) -> Self {
        Self::new(MessageType::HeartbeatAck, json!({ "timestamp": at.as_millis() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_types_map_to_wire_names() {
        for (kind, name) in [
            (MessageType::Auth, "auth"),
            (MessageType::AuthSuccess, "auth_success"),
            (MessageType::AuthError, "auth_error"),
            (MessageType::Notification, "notification"),
            (MessageType::Heartbeat, "heartbeat"),
            (MessageType::HeartbeatAck, "heartbeat_ack"),
            (MessageType::Error, "error"),
        ] {
            assert_eq!(kind.as_str(), name);
            assert_eq!(MessageType::from(name), kind);
        }
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let kind = MessageType::from("chat.typing");
        assert_eq!(kind, MessageType::Other("chat.typing".into()));
        assert_eq!(String::from(kind), "chat.typing");
    }

    #[test]
    fn test_auth_payload_shape() {
        let client = ClientId::new("client-7");
        let env = Envelope::auth("t1", &client, None);
        assert_eq!(env.kind, MessageType::Auth);
        assert_eq!(env.payload, Some(json!({"token": "t1", "clientId": "client-7"})));

        let env = Envelope::auth("t1", &client, Some("m-9"));
        assert_eq!(
            env.payload,
            Some(json!({"token": "t1", "clientId": "client-7", "lastMessageId": "m-9"}))
        );
    }

    #[test]
    fn test_serialized_form_omits_absent_fields() {
        let env = Envelope::bare(MessageType::Heartbeat);
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"type": "heartbeat"})
        );
    }
}
