use crate::error::EventsError;
use chrono::{DateTime, Utc};
use core_types::SessionStatus;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The topic all trading-session events are published on.
pub const TRADING_CHANNEL: &str = "trading";

/// Envelope type tags the client understands.
pub const SESSION_STATUS: &str = "session.status";
pub const SESSION_STARTED: &str = "session.started";
pub const SESSION_STOPPED: &str = "session.stopped";

/// A message pushed by the backend over the WebSocket channel.
///
/// Every frame on the wire has the same outer shape, for example:
/// `{
///   "type": "session.status",
///   "channel": "trading",
///   "timestamp": "2024-05-02T01:00:00+00:00",
///   "payload": { "session_id": 7, "status": "running", ... }
/// }`
///
/// The payload is kept untyped here; `Envelope::message` turns it into a `FeedMessage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub channel: String,
    #[serde(deserialize_with = "core_types::timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    pub payload: Map<String, Value>,
}

impl Envelope {
    /// Structurally decodes a raw text frame.
    pub fn decode(raw: &str) -> Result<Self, EventsError> {
        serde_json::from_str(raw).map_err(EventsError::Envelope)
    }

    /// Returns true if this envelope carries the given tag on the given channel.
    pub fn is(&self, kind: &str, channel: &str) -> bool {
        self.kind == kind && self.channel == channel
    }

    /// Decodes the payload into the typed message selected by `(type, channel)`.
    ///
    /// Unknown combinations are not an error; they come back as `FeedMessage::Unrecognized`.
    pub fn message(&self) -> Result<FeedMessage, EventsError> {
        if self.channel != TRADING_CHANNEL {
            return Ok(FeedMessage::Unrecognized);
        }
        match self.kind.as_str() {
            SESSION_STATUS => self.payload_as().map(FeedMessage::SessionStatus),
            SESSION_STARTED => self.payload_as().map(FeedMessage::SessionStarted),
            SESSION_STOPPED => self.payload_as().map(FeedMessage::SessionStopped),
            _ => Ok(FeedMessage::Unrecognized),
        }
    }

    fn payload_as<T: DeserializeOwned>(&self) -> Result<T, EventsError> {
        // `from_value` needs ownership, and envelopes stay immutable in the buffer.
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(|source| {
            EventsError::Payload {
                kind: self.kind.clone(),
                source,
            }
        })
    }
}

/// Payload of `session.started`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStarted {
    pub session_id: i64,
    #[serde(default)]
    pub stock_code: String,
}

/// Payload of `session.stopped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStopped {
    pub session_id: i64,
}

/// The typed view of an envelope, one variant per known `(type, channel)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// A full status snapshot of one session.
    SessionStatus(SessionStatus),
    SessionStarted(SessionStarted),
    SessionStopped(SessionStopped),
    /// Anything this client does not know how to interpret.
    Unrecognized,
}
