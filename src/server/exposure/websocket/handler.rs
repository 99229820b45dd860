//! WebSocket upgrade handler
//!
//! Handles `GET /ws?userId=<id>`: checks the user id, upgrades the HTTP
//! connection and hands the socket to the session loop.

use super::session::run_session;
use crate::core::HandshakeError;
use crate::server::host::RelayHost;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::stream::StreamExt;
use serde::Deserialize;
use std::sync::Arc;

/// Query parameters accepted on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

impl ConnectQuery {
    /// The user id, if present and non-empty
    pub fn user_id(&self) -> Result<&str, HandshakeError> {
        match self.user_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(HandshakeError::MissingUserId),
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(host): State<Arc<RelayHost>>,
) -> Response {
    let user_id = match query.user_id() {
        Ok(id) => id.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting WebSocket upgrade");
            return e.into_response();
        }
    };

    ws.on_failed_upgrade(|e| tracing::warn!(error = %e, "Error upgrading WebSocket"))
        .on_upgrade(move |socket| handle_socket(socket, host, user_id))
}

async fn handle_socket(socket: WebSocket, host: Arc<RelayHost>, user_id: String) {
    let (ws_write, ws_read) = socket.split();
    run_session(host, user_id, ws_read, ws_write).await;
}
