// src/monitor/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FetchError;

/// Opaque message identifier. Compared for equality only; ids are not assumed
/// to be ordered or monotonic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// Servers have sent both string and numeric ids.
impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum AnyId {
            Text(String),
            Int(i64),
            Float(f64),
        }
        Ok(match AnyId::deserialize(d)? {
            AnyId::Text(s) => Self(s),
            AnyId::Int(n) => Self(n.to_string()),
            AnyId::Float(n) => Self(n.to_string()),
        })
    }
}

/// Decoded message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    /// `system` / `system-silent` messages carry serialized JSON.
    Structured(serde_json::Value),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Structured(_) => None,
        }
    }
}

/// One chat message as delivered to consumers. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    /// Server-assigned unix seconds (may be fractional).
    pub timestamp: f64,
    /// Kind tag, e.g. "text", "system", "system-silent".
    pub kind: String,
    pub payload: Payload,
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub channel_id: Option<String>,
}

impl Event {
    /// Plain text event, mostly useful for tests and fixtures.
    pub fn text(id: impl Into<EventId>, timestamp: f64, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp,
            kind: "text".to_string(),
            payload: Payload::Text(text.into()),
            username: None,
            user_id: None,
            channel_id: None,
        }
    }

    pub fn is_system(&self) -> bool {
        is_system_kind(&self.kind)
    }
}

/// Kinds whose payload is serialized JSON rather than text.
pub fn is_system_kind(kind: &str) -> bool {
    matches!(kind, "system" | "system-silent")
}

/// A bounded-time-range fetch of events: everything with
/// `timestamp >= from_time`, in server order. Implementations do not retry.
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch(&self, from_time: f64) -> Result<Vec<Event>, FetchError>;
    fn name(&self) -> &str;
}

#[async_trait::async_trait]
impl<S: EventSource + ?Sized> EventSource for std::sync::Arc<S> {
    async fn fetch(&self, from_time: f64) -> Result<Vec<Event>, FetchError> {
        (**self).fetch(from_time).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
