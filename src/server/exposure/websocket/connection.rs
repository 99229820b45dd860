//! Handle to a single live WebSocket connection
//!
//! A [`ConnectionHandle`] is a cheap, cloneable reference to the writer task
//! of one connection. The session that accepted the socket owns the writer
//! (through [`Outbound`]); the registry and the broadcaster only hold
//! handles, which can push payloads into the writer's queue or close it.
//!
//! Closing goes through a `watch` flag shared by every clone, the writer
//! and the session, so it is observed even when the payload queue is full.
//! Sends and closes may race freely: once a handle is closed (or its writer
//! is gone) every send fails with [`SendError::Closed`] instead of touching
//! the socket, including a send already waiting for queue space.

use crate::core::SendError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// A cloneable reference to one live connection
///
/// Handles compare equal when they refer to the same connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: Arc<str>,
    tx: mpsc::Sender<Arc<str>>,
    closed: Arc<watch::Sender<bool>>,
    send_timeout: Duration,
}

/// Receiving side of a connection, drained by its writer task
pub struct Outbound {
    rx: mpsc::Receiver<Arc<str>>,
    closed: watch::Receiver<bool>,
}

impl ConnectionHandle {
    /// Create a handle and the receiving end its writer task drains
    pub fn channel(buffer: usize, send_timeout: Duration) -> (Self, Outbound) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let (closed_tx, closed_rx) = watch::channel(false);
        let handle = Self {
            id: format!("conn_{}", Uuid::new_v4().simple()).into(),
            tx,
            closed: Arc::new(closed_tx),
            send_timeout,
        };
        (
            handle,
            Outbound {
                rx,
                closed: closed_rx,
            },
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue a payload for this connection
    ///
    /// Fails if the handle was closed (before or while waiting), the writer
    /// has exited, or the queue stayed full for longer than the send timeout.
    pub async fn send(&self, payload: Arc<str>) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let closed = self.closed();
        let result = tokio::select! {
            biased;
            _ = closed => return Err(self.closed_error()),
            result = self.tx.send_timeout(payload, self.send_timeout) => result,
        };

        match result {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(SendError::Timeout {
                connection_id: self.id.to_string(),
            }),
            Err(SendTimeoutError::Closed(_)) => {
                self.close();
                Err(self.closed_error())
            }
        }
    }

    /// Close the connection
    ///
    /// Idempotent and never blocks. The writer and the owning session both
    /// observe it, whatever the state of the payload queue.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow() || self.tx.is_closed()
    }

    /// Resolves once the handle is closed
    pub fn closed(&self) -> impl Future<Output = ()> + Send + 'static {
        wait_closed(self.closed.subscribe())
    }

    fn closed_error(&self) -> SendError {
        SendError::Closed {
            connection_id: self.id.to_string(),
        }
    }
}

impl Outbound {
    /// Next payload to write
    ///
    /// Returns `None` once the handle is closed (queued payloads are
    /// dropped) or every handle is gone.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        let closed = wait_closed(self.closed.clone());
        tokio::select! {
            biased;
            _ = closed => None,
            payload = self.rx.recv() => payload,
        }
    }

    /// Next queued payload without waiting, `None` when empty or closed
    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        if self.is_closed() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

// A dropped sender means every handle is gone, which counts as closed.
async fn wait_closed(mut closed: watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
