//! ServerBuilder for fluent API to build the relay server

use super::exposure::RelayExposure;
use super::host::RelayHost;
use crate::config::RelayConfig;
use crate::core::MessageStore;
use crate::storage::InMemoryMessageStore;
use anyhow::Result;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for the relay server
///
/// # Example
///
/// ```ignore
/// ServerBuilder::new()
///     .with_config(RelayConfig::from_yaml_file("relay.yaml")?)
///     .with_message_store(InMemoryMessageStore::new())
///     .serve()
///     .await?;
/// ```
pub struct ServerBuilder {
    config: RelayConfig,
    message_store: Option<Arc<dyn MessageStore>>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder with the default configuration
    pub fn new() -> Self {
        Self {
            config: RelayConfig::default(),
            message_store: None,
            custom_routes: Vec::new(),
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the durable message store
    ///
    /// Defaults to an `InMemoryMessageStore` when not called.
    pub fn with_message_store(mut self, store: impl MessageStore + 'static) -> Self {
        self.message_store = Some(Arc::new(store));
        self
    }

    /// Add custom routes to the server
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the transport-agnostic host
    ///
    /// Fails when the configuration does not validate.
    pub fn build_host(mut self) -> Result<RelayHost> {
        self.config.validate()?;

        let store = self
            .message_store
            .take()
            .unwrap_or_else(|| Arc::new(InMemoryMessageStore::new()));

        tracing::debug!(backend = store.backend_name(), "Building relay host");

        Ok(RelayHost::new(self.config, store))
    }

    /// Build the application router
    pub fn build(self) -> Result<Router> {
        self.build_parts().map(|(_, router)| router)
    }

    fn build_parts(mut self) -> Result<(Arc<RelayHost>, Router)> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let host = Arc::new(self.build_host()?);
        let router = RelayExposure::build_router(host.clone(), custom_routes)?;
        Ok((host, router))
    }

    /// Serve the relay with graceful shutdown
    ///
    /// This will:
    /// - Bind to `server.bind_address`
    /// - Start serving requests
    /// - On SIGTERM or Ctrl+C, stop accepting and close every live connection
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.server.bind_address).await?;
        self.serve_with_listener(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_with_listener<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (host, app) = self.build_parts()?;
        let addr = listener.local_addr()?;

        tracing::info!(
            "Server listening on {} (ws path {})",
            addr,
            host.config.server.ws_path
        );

        let closing = host.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                // Sessions only end once their sockets close
                let closed = closing.shutdown();
                tracing::info!(connections = closed, "Closed live connections");
            })
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
