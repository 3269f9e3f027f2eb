//! SSE event type and its text wire framing.

use crate::error::SseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event emitted to a client right after its stream opens. Carries the client ID.
pub const EVENT_CONNECTED: &str = "connected";

/// Event emitted right before the hub ends a client's stream. Carries the client ID.
pub const EVENT_CLOSING: &str = "closing";

/// Comment frame written on the keep-alive interval. Ignored by SSE parsers.
pub const KEEP_ALIVE_FRAME: &str = ": keep-alive\n\n";

/// A server-sent event routed through the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event type tag (the `event:` field).
    pub event: String,

    /// Rendered payload (the `data:` field). Multi-line payloads are split
    /// into one `data:` line per line.
    pub data: String,

    /// Optional event ID (the `id:` field).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Optional reconnection delay hint in milliseconds (the `retry:` field).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u64>,
}

impl Event {
    /// Create an event with a text payload.
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
            retry: None,
        }
    }

    /// Create an event whose payload is the JSON rendering of `data`.
    pub fn json<T: Serialize>(event: impl Into<String>, data: &T) -> Result<Self, SseError> {
        Ok(Self::new(event, serde_json::to_string(data)?))
    }

    /// Set the event ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the reconnection hint.
    pub fn with_retry(mut self, retry_ms: u64) -> Self {
        self.retry = Some(retry_ms);
        self
    }

    /// The synthetic event announcing an open stream.
    pub fn connected(client_id: &str) -> Self {
        Self::new(EVENT_CONNECTED, client_id)
    }

    /// The synthetic event announcing a hub-initiated close.
    pub fn closing(client_id: &str) -> Self {
        Self::new(EVENT_CLOSING, client_id)
    }

    /// Render the event in SSE text framing, blank-line terminated.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = &self.id {
            writeln!(f, "id: {}", single_line(id))?;
        }
        if !self.event.is_empty() {
            writeln!(f, "event: {}", single_line(&self.event))?;
        }
        if let Some(retry) = self.retry {
            writeln!(f, "retry: {}", retry)?;
        }
        if self.data.is_empty() {
            writeln!(f, "data: ")?;
        } else {
            for line in self.data.split('\n') {
                writeln!(f, "data: {}", line.trim_end_matches('\r'))?;
            }
        }
        writeln!(f)
    }
}

/// Field values other than data must not break the framing.
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], "")
}
