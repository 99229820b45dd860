//! Server module for the chat relay
//!
//! This module provides:
//! - `RelayHost`: the shared state (configuration, registry, store)
//! - `ServerBuilder`: fluent assembly and graceful serving
//! - Exposures: `/health` over REST and the `/ws` chat endpoint

pub mod builder;
pub mod exposure;
pub mod host;

pub use builder::ServerBuilder;
pub use exposure::{RelayExposure, RestExposure, WebSocketExposure};
pub use host::RelayHost;
