//! JSON codec for wire envelopes
//!
//! Outbound envelopes without an `id` get a fresh UUID v4 before encoding.
//! Inbound text must be a JSON object with a string `type`; anything else is
//! a [`ProtocolError`] which the caller logs and drops.

use serde_json::Value;
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::errors::ProtocolError;

/// Encoder and decoder for [`Envelope`] frames
#[derive(Debug, Clone)]
pub struct MessageCodec {
    assign_ids: bool,
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self { assign_ids: true }
    }
}

impl MessageCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec that leaves missing ids empty
    pub fn without_id_assignment() -> Self {
        Self { assign_ids: false }
    }

    /// Fill in an id when the envelope has none
    pub fn prepare(&self, envelope: &mut Envelope) {
        if self.assign_ids && envelope.id.is_none() {
            envelope.id = Some(Uuid::new_v4().to_string());
        }
    }

    /// Encode an envelope into a text frame
    pub fn encode(&self, envelope: &Envelope) -> Result<String, ProtocolError> {
        let mut envelope = envelope.clone();
        self.prepare(&mut envelope);
        serde_json::to_string(&envelope).map_err(|e| ProtocolError::Encode {
            reason: e.to_string(),
        })
    }

    /// Decode a text frame into an envelope
    pub fn decode(&self, text: &str) -> Result<Envelope, ProtocolError> {
        let value: Value = serde_json::from_str(text).map_err(|e| ProtocolError::Malformed {
            reason: e.to_string(),
        })?;

        let object = value.as_object().ok_or_else(|| ProtocolError::Malformed {
            reason: "frame is not a JSON object".to_string(),
        })?;
        match object.get("type") {
            Some(Value::String(_)) => {}
            Some(_) => {
                return Err(ProtocolError::Malformed {
                    reason: "type is not a string".to_string(),
                })
            }
            None => return Err(ProtocolError::MissingType),
        }

        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed {
            reason: e.to_string(),
        })
    }

    /// Decode a binary frame, accepted when it holds UTF-8 text
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<Envelope, ProtocolError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ProtocolError::Malformed {
            reason: format!("binary frame is not UTF-8: {e}"),
        })?;
        self.decode(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::MessageType;
    use serde_json::json;

    #[test]
    fn test_encode_assigns_id_when_missing() {
        let codec = MessageCodec::new();
        let text = codec.encode(&Envelope::notification(json!({"n": 1}))).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        let id = value["id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert_eq!(value["type"], "notification");
        assert_eq!(value["payload"], json!({"n": 1}));
    }

    #[test]
    fn test_encode_keeps_existing_id() {
        let codec = MessageCodec::new();
        let env = Envelope::bare("ping").with_id("fixed");
        let value: Value = serde_json::from_str(&codec.encode(&env).unwrap()).unwrap();
        assert_eq!(value["id"], "fixed");
    }

    #[test]
    fn test_encode_without_assignment() {
        let codec = MessageCodec::without_id_assignment();
        let text = codec.encode(&Envelope::bare(MessageType::Heartbeat)).unwrap();
        assert_eq!(text, r#"{"type":"heartbeat"}"#);
    }

    #[test]
    fn test_decode_well_formed() {
        let codec = MessageCodec::new();
        let env = codec
            .decode(r#"{"id":"m1","type":"auth_success","payload":{"user":"u"}}"#)
            .unwrap();
        assert_eq!(env.id.as_deref(), Some("m1"));
        assert_eq!(env.kind, MessageType::AuthSuccess);
        assert_eq!(env.payload, Some(json!({"user": "u"})));
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        let codec = MessageCodec::new();
        assert!(matches!(
            codec.decode("not json"),
            Err(ProtocolError::Malformed { .. })
        ));
        assert!(matches!(
            codec.decode("[1,2,3]"),
            Err(ProtocolError::Malformed { .. })
        ));
        assert_eq!(
            codec.decode(r#"{"payload":{}}"#),
            Err(ProtocolError::MissingType)
        );
        assert!(matches!(
            codec.decode(r#"{"type":7}"#),
            Err(ProtocolError::Malformed { .. })
        ));
    }

    #[test]
    fn test_decode_bytes_requires_utf8() {
        let codec = MessageCodec::new();
        assert!(codec.decode_bytes(br#"{"type":"heartbeat"}"#).is_ok());
        assert!(codec.decode_bytes(&[0xff, 0xfe]).is_err());
    }
}
