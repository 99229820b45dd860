//! Fan-out of one payload to every live connection of a user
//!
//! ```text
//! broadcast(user, payload)
//!        │
//!   registry.snapshot(user)      (read lock, released immediately)
//!        │
//!   for each handle ──send──▶ ok      → delivered
//!                      └────▶ failed  → close + remove from registry
//! ```
//!
//! A dead handle never aborts delivery to the others. Nothing is retried.

use super::connection::ConnectionHandle;
use super::registry::ConnectionRegistry;
use std::sync::Arc;

/// Outcome of a single broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Handles that accepted the payload
    pub delivered: usize,
    /// Handles that refused it and were pruned
    pub pruned: usize,
}

/// Delivers payloads to users through the connection registry
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Send a serialized payload to every connection of `user_id`
    pub async fn broadcast(&self, user_id: &str, payload: Arc<str>) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for handle in self.registry.snapshot(user_id) {
            match handle.send(payload.clone()).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::debug!(
                        user_id = %user_id,
                        connection_id = %handle.id(),
                        error = %e,
                        "Failed to send to connection, pruning"
                    );
                    self.prune(user_id, &handle);
                    report.pruned += 1;
                }
            }
        }

        report
    }

    fn prune(&self, user_id: &str, handle: &ConnectionHandle) {
        // The owning session may have removed it already
        if !self.registry.remove_connection(user_id, handle) {
            handle.close();
        }
    }
}
