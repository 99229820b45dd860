//! Message ingestion: validate → persist → broadcast
//!
//! A `message` event is only delivered once the store has accepted its
//! record. The payload delivered to clients is the inbound object exactly
//! as the sender wrote it, not the persisted record.

use super::broadcast::{Broadcaster, DeliveryReport};
use super::protocol::ChatEvent;
use crate::core::{ChatMessage, IngestError, MessageStore};
use serde_json::Value;
use std::sync::Arc;

/// Result of a successfully ingested message
#[derive(Debug, Clone)]
pub struct Ingested {
    /// The record handed to the store
    pub record: ChatMessage,
    pub to_receiver: DeliveryReport,
    pub to_sender: DeliveryReport,
}

/// Runs the ingestion pipeline for `message` events
#[derive(Clone)]
pub struct MessageIngestor {
    store: Arc<dyn MessageStore>,
    broadcaster: Broadcaster,
}

impl MessageIngestor {
    pub fn new(store: Arc<dyn MessageStore>, broadcaster: Broadcaster) -> Self {
        Self { store, broadcaster }
    }

    /// Ingest one decoded `message` frame
    ///
    /// On a validation or storage error nothing is broadcast. The frame is
    /// delivered to the receiver first, then to the sender's own
    /// connections (multi-device echo).
    pub async fn ingest(&self, frame: &Value) -> Result<Ingested, IngestError> {
        let event = ChatEvent::from_frame(frame)?;

        let record = ChatMessage::new(&event.sender_id, &event.receiver_id, &event.content);
        self.store.insert(record.clone()).await?;

        tracing::debug!(
            message_id = %record.id,
            sender_id = %event.sender_id,
            receiver_id = %event.receiver_id,
            backend = self.store.backend_name(),
            "Message persisted"
        );

        let payload: Arc<str> = Arc::from(frame.to_string());
        let to_receiver = self
            .broadcaster
            .broadcast(&event.receiver_id, payload.clone())
            .await;
        let to_sender = self.broadcaster.broadcast(&event.sender_id, payload).await;

        Ok(Ingested {
            record,
            to_receiver,
            to_sender,
        })
    }
}
