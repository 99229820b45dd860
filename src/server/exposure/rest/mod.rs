//! REST exposure for the relay
//!
//! Only operational routes live here; all chat traffic goes through the
//! WebSocket exposure. The REST exposure consumes a `RelayHost` and produces
//! an Axum `Router`.

use crate::server::host::RelayHost;
use anyhow::Result;
use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;

/// REST exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    ///
    /// # Arguments
    ///
    /// * `host` - The relay host
    /// * `custom_routes` - Additional custom routes to merge
    pub fn build_router(host: Arc<RelayHost>, custom_routes: Vec<Router>) -> Result<Router> {
        let mut app = Self::health_routes(host);

        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        Ok(app)
    }

    /// Build health check routes
    fn health_routes(host: Arc<RelayHost>) -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
            .with_state(host)
    }

    /// Health check endpoint handler
    async fn health_check(State(host): State<Arc<RelayHost>>) -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "chat-relay",
            "storage": host.store.backend_name(),
            "users": host.registry.user_count(),
            "connections": host.registry.connection_count(),
        }))
    }
}
