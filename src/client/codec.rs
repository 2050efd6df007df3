// src/client/codec.rs
//! Wire format of chat messages.
//!
//! Message bodies travel base64-encoded. `system` and `system-silent`
//! messages decode to serialized JSON, every other kind to plain text.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::error::ApiError;
use crate::monitor::types::{is_system_kind, Event, EventId, Payload};

pub fn encode_text(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

pub fn decode_text(raw: &str) -> Result<String, ApiError> {
    let bytes = STANDARD
        .decode(raw.trim())
        .map_err(|e| ApiError::Malformed(format!("message is not base64: {e}")))?;
    String::from_utf8(bytes).map_err(|e| ApiError::Malformed(format!("message is not utf-8: {e}")))
}

pub fn decode_payload(kind: &str, raw: &str) -> Result<Payload, ApiError> {
    let text = decode_text(raw)?;
    if is_system_kind(kind) {
        let value = serde_json::from_str(&text)
            .map_err(|e| ApiError::Malformed(format!("{kind} payload is not JSON: {e}")))?;
        return Ok(Payload::Structured(value));
    }
    Ok(Payload::Text(text))
}

fn default_kind() -> String {
    "text".to_string()
}

/// Message as sent by the server.
#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(rename = "messageId", alias = "message_id")]
    message_id: EventId,
    #[serde(deserialize_with = "epoch_seconds")]
    time: f64,
    #[serde(rename = "type", default = "default_kind")]
    kind: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(rename = "userID", default)]
    user_id: Option<String>,
    #[serde(rename = "channelID", default)]
    channel_id: Option<String>,
}

impl WireMessage {
    fn into_event(self) -> Result<Event, ApiError> {
        let payload = decode_payload(&self.kind, self.message.as_deref().unwrap_or_default())
            .map_err(|e| match e {
                ApiError::Malformed(m) => {
                    ApiError::Malformed(format!("message {}: {m}", self.message_id))
                }
                other => other,
            })?;
        Ok(Event {
            id: self.message_id,
            timestamp: self.time,
            kind: self.kind,
            payload,
            username: self.username,
            user_id: self.user_id,
            channel_id: self.channel_id,
        })
    }
}

// Accept both numbers and numeric strings for timestamps.
fn epoch_seconds<'de, D: serde::Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AnyTime {
        Num(f64),
        Text(String),
    }
    match AnyTime::deserialize(d)? {
        AnyTime::Num(n) => Ok(n),
        AnyTime::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("time {s:?} is not a number"))),
    }
}

/// Decode a `GET /message` response body, preserving server order.
pub fn decode_messages(body: &str) -> Result<Vec<Event>, ApiError> {
    let wire: Vec<WireMessage> = serde_json::from_str(body)
        .map_err(|e| ApiError::Malformed(format!("message list: {e}")))?;
    wire.into_iter().map(WireMessage::into_event).collect()
}
