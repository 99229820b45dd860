//! WebSocket exposure for the chat relay
//!
//! This module provides the `/ws` endpoint and everything behind it: the
//! per-user connection registry, broadcast fan-out, the message ingestion
//! pipeline and the per-connection session loop.
//!
//! # Architecture
//!
//! ```text
//! Client ──ws──▶ /ws?userId=A ──▶ ws_handler() ──▶ run_session()
//!                                                       │
//!                                          register(A) in ConnectionRegistry
//!                                                       │
//!                     frame ──▶ decode ──▶ "message" ──▶ MessageIngestor
//!                                                       │
//!                                   MessageStore.insert ──▶ Broadcaster
//!                                                       │
//!                                  receiver connections ◀┴▶ sender connections
//! ```
//!
//! # Protocol
//!
//! Client → Server (JSON object):
//! - `{"type": "message", "senderId": "A", "receiverId": "B", "content": "hi"}`
//!
//! Server → Client: the accepted `message` object, forwarded unchanged to
//! every connection of the receiver and of the sender. Objects with any
//! other `type` are ignored. A frame that is not a JSON object ends the
//! session.

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod ingest;
pub mod protocol;
pub mod registry;
pub mod session;

pub use broadcast::{Broadcaster, DeliveryReport};
pub use connection::{ConnectionHandle, Outbound};
pub use ingest::{Ingested, MessageIngestor};
pub use protocol::{ChatEvent, EventKind, decode_frame};
pub use registry::{ConnectionRegistry, Registration};
pub use session::{SessionEnd, run_session};

use crate::server::host::RelayHost;
use anyhow::Result;
use axum::{Router, routing::get};
use std::sync::Arc;

/// WebSocket exposure implementation
///
/// Consumes a `RelayHost` and produces an Axum router serving the configured
/// WebSocket path (`/ws` by default).
///
/// # Example
///
/// ```rust,ignore
/// use relay::server::{ServerBuilder, WebSocketExposure, RestExposure};
///
/// let host = Arc::new(ServerBuilder::new().build_host()?);
///
/// let app = RestExposure::build_router(host.clone())?
///     .merge(WebSocketExposure::build_router(host)?);
/// ```
pub struct WebSocketExposure;

impl WebSocketExposure {
    /// Build the WebSocket router from a host
    pub fn build_router(host: Arc<RelayHost>) -> Result<Router> {
        let path = host.config.server.ws_path.clone();
        if !path.starts_with('/') {
            anyhow::bail!("WebSocket path must start with '/': {}", path);
        }

        let router = Router::new()
            .route(&path, get(handler::ws_handler))
            .with_state(host);

        Ok(router)
    }
}
