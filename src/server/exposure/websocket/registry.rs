//! Connection registry for WebSocket clients
//!
//! The `ConnectionRegistry` maps a user id to every live connection that
//! user currently has open (several tabs or devices are common). It is the
//! only shared mutable structure in the relay.
//!
//! # Invariants
//!
//! - A user has an entry if and only if at least one handle is registered.
//! - Adding appends; registering the same handle twice keeps both copies.
//! - Removing closes the handle it removes.
//!
//! # Locking
//!
//! A single `RwLock` guards the map. Add and remove take the write lock,
//! snapshots take the read lock, so snapshots for different users proceed
//! concurrently. The lock is never held across an `.await`: callers take a
//! snapshot and send outside the lock.

use super::connection::ConnectionHandle;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type ConnectionMap = HashMap<String, Vec<ConnectionHandle>>;

/// Thread-safe registry of live connections, keyed by user id
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<ConnectionMap>,
}

impl ConnectionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-updated:
    // every mutation below is a single push/remove.
    fn read(&self) -> RwLockReadGuard<'_, ConnectionMap> {
        self.connections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ConnectionMap> {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection for a user
    pub fn add_connection(&self, user_id: &str, handle: ConnectionHandle) {
        tracing::debug!(user_id = %user_id, connection_id = %handle.id(), "WebSocket client connected");

        self.write()
            .entry(user_id.to_string())
            .or_default()
            .push(handle);
    }

    /// Register a connection and return a guard that removes it when dropped
    pub fn register(self: &Arc<Self>, user_id: &str, handle: ConnectionHandle) -> Registration {
        self.add_connection(user_id, handle.clone());
        Registration {
            registry: self.clone(),
            user_id: user_id.to_string(),
            handle,
        }
    }

    /// Remove one registration of `handle` for a user and close it
    ///
    /// Drops the user's entry once no handles remain. Returns `false` (and
    /// does nothing) when the user or the handle is unknown.
    pub fn remove_connection(&self, user_id: &str, handle: &ConnectionHandle) -> bool {
        let mut connections = self.write();

        let Some(handles) = connections.get_mut(user_id) else {
            return false;
        };
        let Some(position) = handles.iter().position(|h| h == handle) else {
            return false;
        };

        let removed = handles.remove(position);
        removed.close();

        if handles.is_empty() {
            connections.remove(user_id);
        }

        tracing::debug!(user_id = %user_id, connection_id = %removed.id(), "WebSocket client disconnected");
        true
    }

    /// Current handles of a user, for fan-out outside the lock
    pub fn snapshot(&self, user_id: &str) -> Vec<ConnectionHandle> {
        self.read().get(user_id).cloned().unwrap_or_default()
    }

    /// Whether a user has at least one live connection
    pub fn is_connected(&self, user_id: &str) -> bool {
        self.read().contains_key(user_id)
    }

    /// Number of registered handles across all users
    pub fn connection_count(&self) -> usize {
        self.read().values().map(Vec::len).sum()
    }

    /// Number of users with at least one live connection
    pub fn user_count(&self) -> usize {
        self.read().len()
    }

    /// Close and forget every connection (process shutdown)
    ///
    /// Returns the number of handles closed.
    pub fn close_all(&self) -> usize {
        let drained: ConnectionMap = std::mem::take(&mut *self.write());

        let mut closed = 0;
        for handle in drained.into_values().flatten() {
            handle.close();
            closed += 1;
        }

        tracing::info!(closed, "Closed all WebSocket connections");
        closed
    }
}

/// Scoped registration of one connection
///
/// Dropping the guard removes (and closes) the connection, whichever way
/// the owning session ends.
pub struct Registration {
    registry: Arc<ConnectionRegistry>,
    user_id: String,
    handle: ConnectionHandle,
}

impl Registration {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove_connection(&self.user_id, &self.handle);
    }
}
