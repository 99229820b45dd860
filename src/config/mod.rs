//! Configuration loading and management
//!
//! The relay reads a small YAML document:
//!
//! ```yaml
//! server:
//!   bind_address: "0.0.0.0:8080"
//!   ws_path: "/ws"
//!   outbound_buffer: 64
//!   send_timeout_ms: 5000
//! storage:
//!   backend: mongodb
//!   mongodb_uri: "mongodb://localhost:27017"
//!   database: chatapp
//!   collection: messages
//! ```
//!
//! Every field has a default, so an empty document is valid. Environment
//! variables (`RELAY_*`) override the file when
//! [`apply_env_overrides`](RelayConfig::apply_env_overrides) is called.

use crate::core::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Network-facing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind_address: String,

    /// Path that accepts websocket upgrades
    pub ws_path: String,

    /// Capacity of each connection's outbound queue
    pub outbound_buffer: usize,

    /// How long a single send may wait for queue space before the
    /// connection is considered dead
    pub send_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            ws_path: "/ws".to_string(),
            outbound_buffer: 64,
            send_timeout_ms: 5000,
        }
    }
}

impl ServerConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Which durable store to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    InMemory,
    Mongodb,
}

/// Durable store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub mongodb_uri: String,
    pub database: String,
    pub collection: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::InMemory,
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            database: "chatapp".to_string(),
            collection: "messages".to_string(),
        }
    }
}

/// Complete relay configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

impl RelayConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yaml rejects an empty document, treat it as "all defaults"
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Override fields from `RELAY_*` environment variables
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("RELAY_BIND_ADDRESS") {
            self.server.bind_address = v;
        }
        if let Some(v) = lookup("RELAY_WS_PATH") {
            self.server.ws_path = v;
        }
        if let Some(v) = lookup("RELAY_MONGODB_URI") {
            self.storage.mongodb_uri = v;
            self.storage.backend = StorageBackend::Mongodb;
        }
        if let Some(v) = lookup("RELAY_DATABASE") {
            self.storage.database = v;
        }
        if let Some(v) = lookup("RELAY_COLLECTION") {
            self.storage.collection = v;
        }
        self
    }

    /// Check the values that would otherwise fail at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.ws_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "server.ws_path".to_string(),
                message: "must start with '/'".to_string(),
            });
        }
        if self.server.outbound_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.outbound_buffer".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.server.send_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.send_timeout_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();

        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.server.ws_path, "/ws");
        assert_eq!(config.storage.backend, StorageBackend::InMemory);
        assert_eq!(config.storage.database, "chatapp");
        assert_eq!(config.storage.collection, "messages");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = RelayConfig::from_yaml_str("").unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
server:
  ws_path: /chat
storage:
  backend: mongodb
  database: relay
"#;
        let config = RelayConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.server.ws_path, "/chat");
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.storage.backend, StorageBackend::Mongodb);
        assert_eq!(config.storage.database, "relay");
        assert_eq!(config.storage.collection, "messages");
    }

    #[test]
    fn test_yaml_serialization() {
        let config = RelayConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();

        let parsed = RelayConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_yaml() {
        let result = RelayConfig::from_yaml_str("server: [1, 2");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("RELAY_BIND_ADDRESS", "127.0.0.1:9000"),
            ("RELAY_MONGODB_URI", "mongodb://db:27017"),
        ]);

        let config = RelayConfig::default()
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.bind_address, "127.0.0.1:9000");
        assert_eq!(config.storage.mongodb_uri, "mongodb://db:27017");
        assert_eq!(config.storage.backend, StorageBackend::Mongodb);
        assert_eq!(config.server.ws_path, "/ws");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = RelayConfig::default();
        config.server.ws_path = "ws".to_string();
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.server.outbound_buffer = 0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.server.send_timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
