//! Per-connection session loop
//!
//! ```text
//! Connecting ──user id──▶ Active ──read error / close / bad frame / server close──▶ Closed
//! ```
//!
//! Each session:
//!
//! 1. Registers its connection handle with the registry (scoped guard)
//! 2. Spawns a write loop that drains the handle's queue into the socket
//! 3. Reads frames one at a time and fully handles each before the next
//! 4. Stops reading as soon as its handle is closed (pruned or shutdown)
//! 5. Deregisters on exit, which also closes the write side
//!
//! The session is generic over the socket halves so it can run on an axum
//! `WebSocket` or on in-memory streams.

use super::connection::{ConnectionHandle, Outbound};
use super::protocol::{EventKind, decode_frame};
use crate::core::RelayError;
use crate::server::host::RelayHost;
use axum::extract::ws::{CloseFrame, Message, close_code};
use futures::stream::{Stream, StreamExt};
use futures::{Sink, SinkExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

/// Grace period for the writer to flush its close frame after the read side ends
const WRITER_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client sent a close frame
    ClientClosed,
    /// The read stream ended without a close frame
    StreamEnded,
    /// Reading from the transport failed
    ReadError(String),
    /// A frame could not be decoded
    DecodeError(String),
    /// The relay closed the connection (pruned after a failed send, or shutdown)
    ServerClosed,
}

/// Run one connection to completion
///
/// Returns once the connection is closed and deregistered.
pub async fn run_session<R, W, E>(
    host: Arc<RelayHost>,
    user_id: String,
    mut reader: R,
    writer: W,
) -> SessionEnd
where
    R: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: Display + Send,
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: Display + Send,
{
    let config = &host.config.server;
    let (handle, outbound) =
        ConnectionHandle::channel(config.outbound_buffer, config.send_timeout());
    let connection_id = handle.id().to_string();

    let registration = host.registry.register(&user_id, handle);
    let closed = registration.handle().closed();
    tokio::pin!(closed);
    let mut write_task = tokio::spawn(write_loop(writer, outbound, connection_id.clone()));

    tracing::info!(user_id = %user_id, connection_id = %connection_id, "Session started");

    let end = loop {
        let next = tokio::select! {
            biased;
            _ = &mut closed => break SessionEnd::ServerClosed,
            next = reader.next() => next,
        };

        let handled = match next {
            Some(Ok(Message::Text(text))) => {
                handle_frame(&host, &connection_id, text.as_str().as_bytes()).await
            }
            Some(Ok(Message::Binary(data))) => handle_frame(&host, &connection_id, &data).await,
            Some(Ok(Message::Close(_))) => break SessionEnd::ClientClosed,
            // axum answers pings itself
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Err(e)) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "Error reading message");
                break SessionEnd::ReadError(e.to_string());
            }
            None => break SessionEnd::StreamEnded,
        };

        match handled {
            Ok(()) => {}
            Err(e) if e.is_fatal() => {
                tracing::warn!(connection_id = %connection_id, error = %e, "Error reading message");
                break SessionEnd::DecodeError(e.to_string());
            }
            Err(e) => log_dropped_frame(&connection_id, &e),
        }
    };

    drop(registration);

    if tokio::time::timeout(WRITER_SHUTDOWN_GRACE, &mut write_task)
        .await
        .is_err()
    {
        write_task.abort();
    }

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        reason = ?end,
        "Session closed"
    );
    end
}

/// Decode and handle one inbound frame
///
/// Errors for which [`RelayError::is_fatal`] holds end the session, the
/// rest only drop the frame.
async fn handle_frame(
    host: &RelayHost,
    connection_id: &str,
    data: &[u8],
) -> Result<(), RelayError> {
    let frame = decode_frame(data)?;

    match EventKind::of(&frame) {
        Some(EventKind::Message) => {
            let ingested = host.ingestor.ingest(&frame).await?;
            tracing::debug!(
                connection_id = %connection_id,
                message_id = %ingested.record.id,
                delivered = ingested.to_receiver.delivered + ingested.to_sender.delivered,
                "Message relayed"
            );
        }
        Some(EventKind::Other) => {
            tracing::trace!(connection_id = %connection_id, "Ignoring unrecognized event type");
        }
        None => {
            tracing::debug!(connection_id = %connection_id, "Invalid event type");
        }
    }

    Ok(())
}

fn log_dropped_frame(connection_id: &str, err: &RelayError) {
    match err {
        RelayError::Validation(_) => {
            tracing::warn!(connection_id = %connection_id, error = %err, "Invalid message format");
        }
        RelayError::Storage(_) => {
            tracing::error!(connection_id = %connection_id, error = %err, "Error saving message");
        }
        _ => {
            tracing::debug!(connection_id = %connection_id, error = %err, "Dropped frame");
        }
    }
}

/// Forward queued payloads to the socket until the handle is closed
async fn write_loop<W>(mut writer: W, mut outbound: Outbound, connection_id: String)
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    while let Some(text) = outbound.recv().await {
        if let Err(e) = writer.send(Message::Text(text.to_string().into())).await {
            tracing::debug!(
                connection_id = %connection_id,
                error = %e,
                "WebSocket write failed, closing"
            );
            return;
        }
    }

    let frame = CloseFrame {
        code: close_code::NORMAL,
        reason: String::new().into(),
    };
    let _ = writer.send(Message::Close(Some(frame))).await;
    let _ = writer.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::core::{ChatMessage, MessageStore, StorageError};
    use crate::storage::InMemoryMessageStore;
    use futures::channel::mpsc as chan;
    use serde_json::{Value, json};
    use tokio::task::JoinHandle;

    struct Client {
        inbound: chan::UnboundedSender<Result<Message, std::io::Error>>,
        outbound: chan::UnboundedReceiver<Message>,
        session: JoinHandle<SessionEnd>,
    }

    impl Client {
        fn send_json(&self, value: &Value) {
            self.send(Message::Text(value.to_string().into()));
        }

        fn send(&self, message: Message) {
            self.inbound
                .unbounded_send(Ok(message))
                .expect("session should be reading");
        }

        async fn recv(&mut self) -> Message {
            tokio::time::timeout(Duration::from_secs(1), self.outbound.next())
                .await
                .expect("Timeout waiting for outbound frame")
                .expect("Writer ended")
        }

        async fn recv_json(&mut self) -> Value {
            match self.recv().await {
                Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
                other => panic!("Expected text frame, got {:?}", other),
            }
        }

        async fn finish(self) -> SessionEnd {
            tokio::time::timeout(Duration::from_secs(2), self.session)
                .await
                .expect("Timeout waiting for session end")
                .expect("Session panicked")
        }
    }

    fn host() -> (Arc<RelayHost>, InMemoryMessageStore) {
        let store = InMemoryMessageStore::new();
        let host = RelayHost::new(RelayConfig::default(), Arc::new(store.clone()));
        (Arc::new(host), store)
    }

    async fn connect(host: &Arc<RelayHost>, user: &str) -> Client {
        let before = host.registry.snapshot(user).len();
        let (inbound, reader) = chan::unbounded();
        let (writer, outbound) = chan::unbounded();
        let session = tokio::spawn(run_session(host.clone(), user.to_string(), reader, writer));

        wait_for(|| host.registry.snapshot(user).len() > before).await;

        Client {
            inbound,
            outbound,
            session,
        }
    }

    async fn wait_for(condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    fn chat(from: &str, to: &str, content: &str) -> Value {
        json!({"type": "message", "senderId": from, "receiverId": to, "content": content})
    }

    #[tokio::test]
    async fn test_message_reaches_both_parties() {
        let (host, store) = host();
        let mut alice = connect(&host, "alice").await;
        let mut bob = connect(&host, "bob").await;

        let msg = chat("alice", "bob", "hi bob");
        alice.send_json(&msg);

        assert_eq!(bob.recv_json().await, msg);
        assert_eq!(alice.recv_json().await, msg);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_every_device_of_a_user_receives() {
        let (host, _store) = host();
        let alice = connect(&host, "alice").await;
        let mut bob_phone = connect(&host, "bob").await;
        let mut bob_laptop = connect(&host, "bob").await;

        let msg = chat("alice", "bob", "hello");
        alice.send_json(&msg);

        assert_eq!(bob_phone.recv_json().await, msg);
        assert_eq!(bob_laptop.recv_json().await, msg);
    }

    #[tokio::test]
    async fn test_client_close_deregisters() {
        let (host, _store) = host();
        let mut alice = connect(&host, "alice").await;

        alice.send(Message::Close(None));

        assert!(matches!(alice.recv().await, Message::Close(Some(_))));
        assert_eq!(alice.finish().await, SessionEnd::ClientClosed);
        assert!(!host.registry.is_connected("alice"));
    }

    #[tokio::test]
    async fn test_malformed_frame_ends_session() {
        let (host, store) = host();
        let alice = connect(&host, "alice").await;

        alice.send(Message::Text("{not json".to_string().into()));

        assert!(matches!(alice.finish().await, SessionEnd::DecodeError(_)));
        assert!(!host.registry.is_connected("alice"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_non_object_frame_ends_session() {
        let (host, _store) = host();
        let alice = connect(&host, "alice").await;

        alice.send(Message::Text("[1, 2]".to_string().into()));

        assert!(matches!(alice.finish().await, SessionEnd::DecodeError(_)));
        assert!(!host.registry.is_connected("alice"));
    }

    #[tokio::test]
    async fn test_read_error_ends_session() {
        let (host, _store) = host();
        let alice = connect(&host, "alice").await;

        alice
            .inbound
            .unbounded_send(Err(std::io::Error::other("connection reset")))
            .unwrap();

        assert!(matches!(alice.finish().await, SessionEnd::ReadError(_)));
        assert!(!host.registry.is_connected("alice"));
    }

    #[tokio::test]
    async fn test_stream_end_deregisters() {
        let (host, _store) = host();
        let alice = connect(&host, "alice").await;

        alice.inbound.close_channel();

        assert_eq!(alice.finish().await, SessionEnd::StreamEnded);
        assert!(!host.registry.is_connected("alice"));
    }

    #[tokio::test]
    async fn test_invalid_message_keeps_session_open() {
        let (host, store) = host();
        let mut alice = connect(&host, "alice").await;

        alice.send_json(&json!({"type": "message", "senderId": "alice", "receiverId": "bob"}));
        let msg = chat("alice", "bob", "second try");
        alice.send_json(&msg);

        assert_eq!(alice.recv_json().await, msg);
        assert_eq!(store.len(), 1);
        assert!(host.registry.is_connected("alice"));
    }

    #[tokio::test]
    async fn test_unknown_and_untyped_events_are_ignored() {
        let (host, store) = host();
        let mut alice = connect(&host, "alice").await;

        alice.send_json(&json!({"type": "typing", "senderId": "alice"}));
        alice.send_json(&json!({"content": "no type"}));
        alice.send_json(&json!({"type": 7}));
        let msg = chat("alice", "alice", "still here");
        alice.send_json(&msg);

        assert_eq!(alice.recv_json().await, msg);
        assert_eq!(store.len(), 1);
    }

    /// Rejects any record whose content is "lost"
    struct SelectiveStore {
        inner: InMemoryMessageStore,
    }

    #[async_trait::async_trait]
    impl MessageStore for SelectiveStore {
        async fn insert(&self, record: ChatMessage) -> Result<(), StorageError> {
            if record.content == "lost" {
                return Err(StorageError::Unavailable {
                    backend: self.backend_name().to_string(),
                });
            }
            self.inner.insert(record).await
        }

        fn backend_name(&self) -> &'static str {
            "selective"
        }
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_session_usable() {
        let store = InMemoryMessageStore::new();
        let host = Arc::new(RelayHost::new(
            RelayConfig::default(),
            Arc::new(SelectiveStore {
                inner: store.clone(),
            }),
        ));
        let mut alice = connect(&host, "alice").await;
        let mut bob = connect(&host, "bob").await;

        alice.send_json(&chat("alice", "bob", "lost"));
        let msg = chat("alice", "bob", "delivered");
        alice.send_json(&msg);

        // The failed message never shows up, the next one does
        assert_eq!(bob.recv_json().await, msg);
        assert_eq!(alice.recv_json().await, msg);
        assert_eq!(store.len(), 1);
        assert_eq!(store.records()[0].content, "delivered");
    }

    #[tokio::test]
    async fn test_binary_json_frames_are_accepted() {
        let (host, _store) = host();
        let mut alice = connect(&host, "alice").await;

        let msg = chat("alice", "alice", "binary");
        alice.send(Message::Binary(msg.to_string().into_bytes().into()));

        assert_eq!(alice.recv_json().await, msg);
    }

    #[tokio::test]
    async fn test_shutdown_ends_session() {
        let (host, _store) = host();
        let mut alice = connect(&host, "alice").await;

        assert_eq!(host.shutdown(), 1);

        assert!(matches!(alice.recv().await, Message::Close(Some(_))));
        assert_eq!(alice.finish().await, SessionEnd::ServerClosed);
        assert!(!host.registry.is_connected("alice"));
    }

    #[tokio::test]
    async fn test_slow_reader_is_pruned_and_session_ends() {
        let mut config = RelayConfig::default();
        config.server.outbound_buffer = 1;
        config.server.send_timeout_ms = 50;
        let host = Arc::new(RelayHost::new(config, Arc::new(InMemoryMessageStore::new())));

        // Every write takes far longer than the send timeout
        let written = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = written.clone();
        let writer = Box::pin(futures::sink::unfold((), move |(), _msg: Message| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, std::io::Error>(())
            }
        }));
        let (inbound, reader) = chan::unbounded::<Result<Message, std::io::Error>>();
        let session = tokio::spawn(run_session(host.clone(), "bob".to_string(), reader, writer));
        wait_for(|| host.registry.is_connected("bob")).await;

        let mut pruned = 0;
        for _ in 0..5 {
            let report = host.broadcaster.broadcast("bob", Arc::from("{}")).await;
            pruned += report.pruned;
            if pruned > 0 {
                break;
            }
        }

        assert_eq!(pruned, 1);
        assert!(!host.registry.is_connected("bob"));

        let end = tokio::time::timeout(Duration::from_millis(1500), session)
            .await
            .expect("pruned session should end")
            .expect("Session panicked");
        assert_eq!(end, SessionEnd::ServerClosed);
        assert!(inbound.is_closed());
        assert!(written.load(std::sync::atomic::Ordering::SeqCst) >= 1);
    }
}
