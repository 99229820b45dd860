//! In-memory implementation of MessageStore for testing and development

use crate::core::{ChatMessage, MessageStore, StorageError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// In-memory message store
///
/// Records are appended to a vector behind an `RwLock`. Failures can be
/// injected with [`set_failing`](Self::set_failing) to exercise the
/// "persistence failed, do not broadcast" path.
#[derive(Clone, Default)]
pub struct InMemoryMessageStore {
    records: Arc<RwLock<Vec<ChatMessage>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryMessageStore {
    /// Create a new, empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of everything written so far, in insertion order
    pub fn records(&self) -> Vec<ChatMessage> {
        self.records
            .read()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert(&self, record: ChatMessage) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                backend: self.backend_name().to_string(),
            });
        }

        let mut records = self
            .records
            .write()
            .map_err(|e| StorageError::InsertError {
                backend: self.backend_name().to_string(),
                message: format!("Failed to acquire write lock: {}", e),
            })?;

        records.push(record);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
