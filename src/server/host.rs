//! Server host for the relay
//!
//! `RelayHost` owns all state shared between sessions: the configuration,
//! the connection registry, the durable store and the components built on
//! them. It is constructed once at startup and passed (as an `Arc`) to the
//! exposures; there is no global state.

use crate::config::RelayConfig;
use crate::core::MessageStore;
use crate::server::exposure::websocket::{Broadcaster, ConnectionRegistry, MessageIngestor};
use std::sync::Arc;

/// Host context containing all relay state
///
/// # Example
///
/// ```rust,ignore
/// let host = Arc::new(RelayHost::new(
///     RelayConfig::default(),
///     Arc::new(InMemoryMessageStore::new()),
/// ));
///
/// let app = WebSocketExposure::build_router(host.clone())?;
/// // ... on shutdown
/// host.shutdown();
/// ```
pub struct RelayHost {
    /// Effective configuration
    pub config: Arc<RelayConfig>,

    /// Live connections per user
    pub registry: Arc<ConnectionRegistry>,

    /// Durable store for chat records
    pub store: Arc<dyn MessageStore>,

    /// Fan-out over the registry
    pub broadcaster: Broadcaster,

    /// Validate → persist → broadcast pipeline
    pub ingestor: MessageIngestor,
}

impl RelayHost {
    /// Build the host and wire its components together
    pub fn new(config: RelayConfig, store: Arc<dyn MessageStore>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Broadcaster::new(registry.clone());
        let ingestor = MessageIngestor::new(store.clone(), broadcaster.clone());

        Self {
            config: Arc::new(config),
            registry,
            store,
            broadcaster,
            ingestor,
        }
    }

    /// Close every live connection
    ///
    /// Returns the number of connections that were closed.
    pub fn shutdown(&self) -> usize {
        self.registry.close_all()
    }
}
