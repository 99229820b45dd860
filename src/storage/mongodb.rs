//! MongoDB storage backend using the official MongoDB async driver.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! chat-relay = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! Every record goes to a single collection (default `chatapp.messages`) as
//! one document. `_id` holds the 32-char hex form of the message id (the same
//! hex that prefixes `m_id`). `status` is an int32 and `created_at` a BSON
//! datetime.

use crate::core::{ChatMessage, MessageStore, StorageError};
use async_trait::async_trait;
use mongodb::bson::{self, Document, doc};
use mongodb::{Client, Collection, Database};

const BACKEND: &str = "mongodb";

/// Convert a chat record into the document written to MongoDB
pub fn record_to_document(record: &ChatMessage) -> Document {
    doc! {
        "_id": record.id.to_hex(),
        "mp_id": record.mp_id.as_str(),
        "m_id": record.m_id.as_str(),
        "content": record.content.as_str(),
        "senderId": record.sender_id.as_str(),
        "status": i32::from(record.status),
        "is_unread": record.is_unread,
        "created_at": bson::DateTime::from_millis(record.created_at.timestamp_millis()),
    }
}

/// Message store backed by a MongoDB collection.
///
/// # Example
///
/// ```rust,ignore
/// use relay::storage::MongoMessageStore;
///
/// let store = MongoMessageStore::connect("mongodb://localhost:27017", "chatapp", "messages").await?;
/// store.insert(ChatMessage::new("alice", "bob", "hi")).await?;
/// ```
#[derive(Clone, Debug)]
pub struct MongoMessageStore {
    collection: Collection<Document>,
}

impl MongoMessageStore {
    /// Wrap an existing database handle
    pub fn new(database: Database, collection: &str) -> Self {
        Self {
            collection: database.collection(collection),
        }
    }

    /// Connect using a connection string
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, StorageError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| StorageError::ConnectionError {
                backend: BACKEND.to_string(),
                message: e.to_string(),
            })?;

        tracing::info!(database = %database, collection = %collection, "Connected to MongoDB");

        Ok(Self::new(client.database(database), collection))
    }

    /// Get a reference to the underlying collection.
    pub fn collection(&self) -> &Collection<Document> {
        &self.collection
    }
}

#[async_trait]
impl MessageStore for MongoMessageStore {
    async fn insert(&self, record: ChatMessage) -> Result<(), StorageError> {
        self.collection
            .insert_one(record_to_document(&record))
            .await
            .map_err(|e| StorageError::InsertError {
                backend: BACKEND.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_to_document_uses_hex_id() {
        let record = ChatMessage::new("alice", "bob", "hello");
        let doc = record_to_document(&record);

        assert!(doc.get("id").is_none());
        let id = doc.get_str("_id").unwrap();
        assert_eq!(id, record.id.to_hex());
        assert!(record.m_id.starts_with(id));
        assert_eq!(doc.get_str("mp_id").unwrap(), "bob");
        assert_eq!(doc.get_str("senderId").unwrap(), "alice");
        assert_eq!(doc.get_str("m_id").unwrap(), record.m_id);
        assert_eq!(doc.get_i32("status").unwrap(), 1);
        assert!(doc.get_bool("is_unread").unwrap());
    }

    #[test]
    fn test_created_at_is_a_bson_datetime() {
        let record = ChatMessage::new("alice", "bob", "hello");
        let doc = record_to_document(&record);

        let created_at = doc.get_datetime("created_at").unwrap();
        assert_eq!(
            created_at.timestamp_millis(),
            record.created_at.timestamp_millis()
        );
    }
}
