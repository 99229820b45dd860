//! Durable store boundary

use crate::core::error::StorageError;
use crate::core::message::ChatMessage;
use async_trait::async_trait;

/// Append-only sink for chat message records
///
/// The relay only ever writes through this trait; reading history back is
/// left to whatever owns the underlying database. Implementations must be
/// safe to share between every live session.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a freshly created record
    async fn insert(&self, record: ChatMessage) -> Result<(), StorageError>;

    /// Short backend name used in logs and errors
    fn backend_name(&self) -> &'static str;
}
