//! # Chat Relay
//!
//! A real-time chat message relay over WebSockets.
//!
//! ## Features
//!
//! - **Multi-device delivery**: every live connection of a user receives
//!   their messages, including echoes of the ones they send
//! - **Persist then deliver**: a message is broadcast only after the store
//!   accepted its record
//! - **Self-healing registry**: connections that refuse a send are pruned
//! - **Pluggable storage**: in-memory, or MongoDB behind `mongodb_backend`
//! - **Configuration-Based**: YAML file plus `RELAY_*` environment overrides
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use relay::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     ServerBuilder::new()
//!         .with_config(RelayConfig::default())
//!         .with_message_store(InMemoryMessageStore::new())
//!         .serve()
//!         .await
//! }
//! ```
//!
//! Clients connect to `ws://host:8080/ws?userId=alice` and send
//! `{"type":"message","senderId":"alice","receiverId":"bob","content":"hi"}`.

pub mod config;
pub mod core;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        ChatMessage, MessageId, MessageStatus, MessageStore, RelayError, StorageError,
    };

    // === WebSocket ===
    pub use crate::server::exposure::websocket::{
        Broadcaster, ConnectionHandle, ConnectionRegistry, MessageIngestor,
    };

    // === Storage ===
    pub use crate::storage::InMemoryMessageStore;
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoMessageStore;

    // === Config ===
    pub use crate::config::{RelayConfig, StorageBackend};

    // === Server ===
    pub use crate::server::{RelayExposure, RelayHost, ServerBuilder};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
}
