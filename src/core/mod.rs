//! Core module containing the relay's fundamental types and traits

pub mod error;
pub mod message;
pub mod store;

pub use error::{
    ConfigError, DecodeError, HandshakeError, IngestError, RelayError, SendError, StorageError,
    ValidationError,
};
pub use message::{ChatMessage, MessageId, MessageStatus};
pub use store::MessageStore;
