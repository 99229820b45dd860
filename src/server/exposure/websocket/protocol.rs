//! WebSocket message protocol definitions
//!
//! Clients send JSON objects carrying a `type` discriminator:
//!
//! ```json
//! {"type": "message", "senderId": "alice", "receiverId": "bob", "content": "hi"}
//! ```
//!
//! Decoding happens in steps. [`decode_frame`] turns the raw frame into a
//! JSON object (anything else is fatal for the connection).
//! [`EventKind::of`] then reads only the discriminator, and once the kind
//! is known the full variant is decoded, e.g. [`ChatEvent::from_frame`].
//! A missing, non-string or unknown discriminator is not an error.
//!
//! Server → client frames are the inbound `message` objects, forwarded
//! unmodified to every live connection of the sender and the recipient.

use crate::core::error::{DecodeError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// Discriminator values understood by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Message,
    Other,
}

/// Only the discriminator of an inbound object
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

impl EventKind {
    /// Read the discriminator of a decoded frame
    ///
    /// Returns `None` when `type` is absent or not a string.
    pub fn of(frame: &Value) -> Option<Self> {
        let envelope = Envelope::deserialize(frame).ok()?;
        Some(match envelope.kind.as_str() {
            "message" => EventKind::Message,
            _ => EventKind::Other,
        })
    }
}

/// A chat message as sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ChatEvent {
    #[serde(rename = "senderId")]
    #[validate(length(min = 1, message = "senderId must not be empty"))]
    pub sender_id: String,

    #[serde(rename = "receiverId")]
    #[validate(length(min = 1, message = "receiverId must not be empty"))]
    pub receiver_id: String,

    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: String,
}

impl ChatEvent {
    /// Decode and validate the `message` variant of a frame
    pub fn from_frame(frame: &Value) -> Result<Self, ValidationError> {
        let event =
            ChatEvent::deserialize(frame).map_err(|e| ValidationError::Shape(e.to_string()))?;
        event.validate()?;
        Ok(event)
    }
}

/// Decode raw frame bytes into a JSON value that is guaranteed to be an object
pub fn decode_frame(bytes: &[u8]) -> Result<Value, DecodeError> {
    let value = serde_json::from_slice::<Value>(bytes)?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(DecodeError::NotAnObject {
            found: json_type_name(&value),
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
