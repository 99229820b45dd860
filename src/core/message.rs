//! Persisted chat message record
//!
//! A [`ChatMessage`] is built exactly once, when a `message` event is
//! ingested, and handed to the store. The relay never reads, mutates or
//! deletes it afterwards.
//!
//! The serialized field names are the contract with the store:
//!
//! ```json
//! {
//!   "id": "9f1c...",
//!   "mp_id": "bob",
//!   "m_id": "9f1c..._alice",
//!   "content": "hi",
//!   "senderId": "alice",
//!   "status": 1,
//!   "is_unread": true,
//!   "created_at": "2026-01-01T00:00:00Z"
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a persisted message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Lowercase hex encoding, without separators
    pub fn to_hex(&self) -> String {
        self.0.simple().to_string()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Delivery status stored as an integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum MessageStatus {
    Sent,
}

impl From<MessageStatus> for i32 {
    fn from(status: MessageStatus) -> Self {
        match status {
            MessageStatus::Sent => 1,
        }
    }
}

impl TryFrom<i32> for MessageStatus {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageStatus::Sent),
            other => Err(format!("unknown message status {}", other)),
        }
    }
}

/// A chat message as written to the durable store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,

    /// Recipient identifier
    pub mp_id: String,

    /// Composite delivery id, `{hex(id)}_{sender_id}`
    pub m_id: String,

    pub content: String,

    #[serde(rename = "senderId")]
    pub sender_id: String,

    pub status: MessageStatus,

    pub is_unread: bool,

    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a new record stamped with a fresh id and the current time
    pub fn new(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::with_id(MessageId::new(), sender_id, receiver_id, content, Utc::now())
    }

    pub fn with_id(
        id: MessageId,
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let sender_id = sender_id.into();
        Self {
            m_id: delivery_id(&id, &sender_id),
            id,
            mp_id: receiver_id.into(),
            content: content.into(),
            sender_id,
            status: MessageStatus::Sent,
            is_unread: true,
            created_at,
        }
    }

    pub fn receiver_id(&self) -> &str {
        &self.mp_id
    }
}

/// Composite delivery id for a message sent by `sender_id`
pub fn delivery_id(id: &MessageId, sender_id: &str) -> String {
    format!("{}_{}", id.to_hex(), sender_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_message_defaults() {
        let msg = ChatMessage::new("alice", "bob", "hello");

        assert_eq!(msg.sender_id, "alice");
        assert_eq!(msg.receiver_id(), "bob");
        assert_eq!(msg.status, MessageStatus::Sent);
        assert!(msg.is_unread);
        assert_eq!(msg.m_id, format!("{}_alice", msg.id.to_hex()));
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = ChatMessage::new("alice", "bob", "one");
        let b = ChatMessage::new("alice", "bob", "two");
        assert_ne!(a.id, b.id);
        assert_ne!(a.m_id, b.m_id);
    }

    #[test]
    fn test_hex_id_has_no_separators() {
        let id = MessageId::new();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_serialized_field_names() {
        let msg = ChatMessage::new("alice", "bob", "hello");
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["mp_id"], "bob");
        assert_eq!(value["senderId"], "alice");
        assert_eq!(value["status"], json!(1));
        assert_eq!(value["is_unread"], json!(true));
        assert!(value["m_id"].as_str().unwrap().ends_with("_alice"));
        assert!(value["created_at"].is_string());
        assert!(value.get("sender_id").is_none());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result: Result<MessageStatus, _> = serde_json::from_value(json!(7));
        assert!(result.is_err());
    }
}
