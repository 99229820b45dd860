//! Typed error handling for the relay
//!
//! Every failure in the relay is contained to the connection that produced
//! it. The enums below let callers tell the categories apart so the session
//! loop can decide whether a connection survives the failure.
//!
//! # Error Categories
//!
//! - [`HandshakeError`]: the upgrade request is unusable (no connection is registered)
//! - [`DecodeError`]: an inbound frame is not a JSON object (fatal for the connection)
//! - [`ValidationError`]: a `message` event has the wrong shape (event dropped)
//! - [`StorageError`]: the durable store rejected a record (message not broadcast)
//! - [`SendError`]: a single connection handle refused a payload (handle pruned)
//! - [`ConfigError`]: configuration could not be loaded or is invalid
//!
//! # Example
//!
//! ```rust,ignore
//! let handled: Result<(), RelayError> = async {
//!     let frame = decode_frame(bytes)?;
//!     ingestor.ingest(&frame).await?;
//!     Ok(())
//! }
//! .await;
//!
//! if let Err(e) = handled {
//!     if e.is_fatal() {
//!         // stop reading and close the connection
//!     }
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// The top-level error type for the relay
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RelayError {
    /// Whether the session that hit this error must stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, RelayError::Decode(_) | RelayError::Handshake(_))
    }
}

// =============================================================================
// Handshake Errors
// =============================================================================

/// Errors raised while turning an upgrade request into a session
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The `userId` query parameter is absent or empty
    #[error("No userId provided")]
    MissingUserId,
}

/// Error body returned when the upgrade is refused
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl HandshakeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HandshakeError::MissingUserId => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            HandshakeError::MissingUserId => "MISSING_USER_ID",
        }
    }
}

impl IntoResponse for HandshakeError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

// =============================================================================
// Decode Errors
// =============================================================================

/// An inbound frame could not be decoded into an event object
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload is JSON but not an object
    #[error("expected a JSON object, got {found}")]
    NotAnObject { found: &'static str },
}

// =============================================================================
// Validation Errors
// =============================================================================

/// A recognized event whose fields do not have the required shape
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field is missing or has the wrong JSON type
    #[error("Invalid message format: {0}")]
    Shape(String),

    /// A field is present but fails a content rule (e.g. empty string)
    #[error("Invalid message format: {0}")]
    Fields(#[from] validator::ValidationErrors),
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors reported by a durable store
#[derive(Debug, Error)]
pub enum StorageError {
    /// Could not reach the backend
    #[error("Failed to connect to {backend}: {message}")]
    ConnectionError { backend: String, message: String },

    /// The backend rejected the write
    #[error("{backend} insert error: {message}")]
    InsertError { backend: String, message: String },

    /// Backend not available (e.g. lock poisoned, failure injected)
    #[error("Storage backend '{backend}' is unavailable")]
    Unavailable { backend: String },
}

// =============================================================================
// Send Errors
// =============================================================================

/// Why a payload could not be handed to a connection
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The handle was closed before or during the send
    #[error("connection {connection_id} is closed")]
    Closed { connection_id: String },

    /// The writer did not accept the payload in time
    #[error("connection {connection_id} timed out")]
    Timeout { connection_id: String },
}

// =============================================================================
// Ingestion Errors
// =============================================================================

/// Failures of the validate, persist, broadcast pipeline
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<IngestError> for RelayError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Validation(e) => RelayError::Validation(e),
            IngestError::Storage(e) => RelayError::Storage(e),
        }
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration loading and validation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}
