//! chat-relay binary
//!
//! Usage: `chat-relay [config.yaml]`. The config path may also be given
//! through `RELAY_CONFIG`; without one the defaults are used.

use anyhow::{Context, Result};
use relay::config::{RelayConfig, StorageBackend};
use relay::server::ServerBuilder;
use relay::storage::InMemoryMessageStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    config.validate()?;

    let builder = ServerBuilder::new().with_config(config.clone());
    let builder = match config.storage.backend {
        StorageBackend::InMemory => {
            tracing::warn!("Using in-memory storage, messages are lost on restart");
            builder.with_message_store(InMemoryMessageStore::new())
        }
        StorageBackend::Mongodb => with_mongodb(builder, &config).await?,
    };

    builder.serve().await
}

fn load_config() -> Result<RelayConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("RELAY_CONFIG").ok());

    let config = match path {
        Some(path) => RelayConfig::from_yaml_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => RelayConfig::default(),
    };

    Ok(config.apply_env_overrides())
}

#[cfg(feature = "mongodb_backend")]
async fn with_mongodb(builder: ServerBuilder, config: &RelayConfig) -> Result<ServerBuilder> {
    use relay::storage::MongoMessageStore;

    let store = MongoMessageStore::connect(
        &config.storage.mongodb_uri,
        &config.storage.database,
        &config.storage.collection,
    )
    .await?;

    Ok(builder.with_message_store(store))
}

#[cfg(not(feature = "mongodb_backend"))]
async fn with_mongodb(_builder: ServerBuilder, _config: &RelayConfig) -> Result<ServerBuilder> {
    anyhow::bail!(
        "storage.backend is mongodb but this binary was built without the \
         mongodb_backend feature"
    )
}
