//! API exposures for the relay
//!
//! Each exposure consumes a `RelayHost` and produces a Router for its
//! protocol. `RelayExposure` combines them into the application router.

pub mod rest;
pub mod websocket;

pub use rest::RestExposure;
pub use websocket::WebSocketExposure;

use super::host::RelayHost;
use anyhow::Result;
use axum::Router;
use axum::http::{Method, header};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Complete relay router: health routes plus the WebSocket endpoint
pub struct RelayExposure;

impl RelayExposure {
    /// Build the application router from a host
    pub fn build_router(host: Arc<RelayHost>, custom_routes: Vec<Router>) -> Result<Router> {
        let rest = RestExposure::build_router(host.clone(), custom_routes)?;
        let ws = WebSocketExposure::build_router(host)?;

        Ok(rest.merge(ws).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer()),
        ))
    }
}

/// Any origin; GET, POST and OPTIONS; `Content-Type` header
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
