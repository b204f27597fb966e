use std::collections::HashMap;

use config::{Config as ConfigLib, ConfigBuilder, ConfigError, Environment, builder::DefaultState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Where the delivery queue lives
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Rest,
    Memory,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub base_url: Option<String>,
    pub service_key: Option<String>,
    pub deliveries_table: String,
    pub destinations_table: String,
    pub request_timeout_secs: u64,
}

// The service key must never end up in logs
impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .field("service_key", &self.service_key.as_ref().map(|_| "<redacted>"))
            .field("deliveries_table", &self.deliveries_table)
            .field("destinations_table", &self.destinations_table)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub request_timeout_secs: u64,
    pub concurrency: usize,
    pub lease_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Self::set_defaults()?;
        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Use system environment variables
            // Should be in the format APP_SERVER__PORT or APP_STORE__BASE_URL
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// A lease has to outlive the slowest delivery, or a second pass can take the record over.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.delivery.lease_secs <= self.delivery.request_timeout_secs {
            return Err(ConfigError::Message(format!(
                "delivery.lease_secs ({}) must be greater than delivery.request_timeout_secs ({})",
                self.delivery.lease_secs, self.delivery.request_timeout_secs
            )));
        }
        Ok(())
    }

    /// Set default values for the configuration.
    /// This is used when no environment variables or config file are provided
    fn set_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        ConfigLib::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("store.backend", "rest")?
            .set_default("store.deliveries_table", "webhook_deliveries")?
            .set_default("store.destinations_table", "webhooks")?
            .set_default("store.request_timeout_secs", 15)?
            .set_default("delivery.batch_size", 50)?
            .set_default("delivery.max_attempts", 5)?
            .set_default("delivery.request_timeout_secs", 30)?
            .set_default("delivery.concurrency", 4)?
            .set_default("delivery.lease_secs", 300)
    }
}
