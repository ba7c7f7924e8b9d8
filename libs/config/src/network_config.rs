//! Network Configuration Module
//!
//! Provides configuration loading and management for an actor network.
//! Supports loading from TOML files with environment variable overrides
//! (`CAP__<SECTION>__<KEY>`).

use crate::protocol::{DEFAULT_BROKER_ENDPOINT, DEFAULT_NUM_ATTEMPTS};
use crate::service;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Main network configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network identity
    pub network: NetworkSettings,

    /// Relay broker settings
    pub broker: BrokerSettings,

    /// Request/reply settings used by connectors
    pub connector: ConnectorSettings,

    /// Receive loop settings for local actors
    pub actor: ActorSettings,
}

/// Network identity settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct NetworkSettings {
    pub name: String,
}

/// Broker settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct BrokerSettings {
    /// Endpoint the relay binds and every socket connects to
    pub endpoint: String,

    /// Envelopes buffered between publishers and the relay thread
    pub queue_capacity: usize,
}

/// Connector settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ConnectorSettings {
    /// How long a single request attempt waits for its reply
    pub request_timeout_ms: u64,

    /// Attempt budget used by the demo and by callers that don't pick one
    pub num_attempts: u32,
}

/// Local actor runtime settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ActorSettings {
    pub recv_poll_interval_ms: u64,
    pub mailbox_capacity: usize,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            name: service::network::DEFAULT_NAME.to_string(),
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_BROKER_ENDPOINT.to_string(),
            queue_capacity: service::broker::QUEUE_CAPACITY,
        }
    }
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: service::connector::REQUEST_TIMEOUT_MS,
            num_attempts: DEFAULT_NUM_ATTEMPTS,
        }
    }
}

impl Default for ActorSettings {
    fn default() -> Self {
        Self {
            recv_poll_interval_ms: service::actor::RECV_POLL_INTERVAL_MS,
            mailbox_capacity: service::actor::MAILBOX_CAPACITY,
        }
    }
}

impl ConnectorSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ActorSettings {
    pub fn recv_poll_interval(&self) -> Duration {
        Duration::from_millis(self.recv_poll_interval_ms)
    }
}

impl NetworkConfig {
    /// Load configuration from an optional TOML file with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading network config: {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        // Override with environment variables (CAP__ prefix)
        builder = builder.add_source(
            Environment::with_prefix("CAP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Parse configuration embedded as a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Expand environment variables in string values
    pub fn expand_env_vars(&mut self) -> Result<()> {
        let expanded = shellexpand::env(&self.broker.endpoint)
            .context("Failed to expand broker endpoint")?;
        self.broker.endpoint = expanded.to_string();

        let expanded =
            shellexpand::env(&self.network.name).context("Failed to expand network name")?;
        self.network.name = expanded.to_string();

        Ok(())
    }

    /// Reject values the runtime cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.broker.endpoint.trim().is_empty() {
            bail!("broker.endpoint must not be empty");
        }
        if self.broker.queue_capacity == 0 {
            bail!("broker.queue_capacity must be greater than zero");
        }
        if self.connector.num_attempts == 0 {
            bail!("connector.num_attempts must be at least 1");
        }
        if self.connector.request_timeout_ms == 0 {
            bail!("connector.request_timeout_ms must be greater than zero");
        }
        if self.actor.mailbox_capacity == 0 {
            bail!("actor.mailbox_capacity must be greater than zero");
        }
        if self.actor.recv_poll_interval_ms == 0 {
            bail!("actor.recv_poll_interval_ms must be greater than zero");
        }

        debug!(network = %self.network.name, "Configuration validated");
        Ok(())
    }
}

/// Convenience function to load, expand and validate configuration
pub fn load_config(path: Option<&Path>) -> Result<NetworkConfig> {
    let mut config = NetworkConfig::load(path)?;
    config.expand_env_vars()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = NetworkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.network.name, "Local Actor Network");
        assert_eq!(config.broker.endpoint, "inproc://cap-broker");
        assert_eq!(config.connector.num_attempts, 5);
        assert_eq!(config.connector.request_timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn test_load_base_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("network.toml");

        let config_content = r#"
[network]
name = "test network"

[broker]
endpoint = "inproc://test-broker"

[connector]
request_timeout_ms = 250
num_attempts = 3
"#;

        fs::write(&config_path, config_content).unwrap();

        let config = NetworkConfig::load(Some(&config_path)).unwrap();

        assert_eq!(config.network.name, "test network");
        assert_eq!(config.broker.endpoint, "inproc://test-broker");
        assert_eq!(config.connector.request_timeout_ms, 250);
        assert_eq!(config.connector.num_attempts, 3);

        // Sections absent from the file keep their defaults
        assert_eq!(config.broker.queue_capacity, 10_000);
        assert_eq!(config.actor, ActorSettings::default());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(NetworkConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_from_toml_str_partial() {
        let config = NetworkConfig::from_toml_str(
            r#"
[actor]
recv_poll_interval_ms = 20
"#,
        )
        .unwrap();

        assert_eq!(config.actor.recv_poll_interval(), Duration::from_millis(20));
        assert_eq!(config.actor.mailbox_capacity, 1_000);
        assert_eq!(config.connector, ConnectorSettings::default());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = NetworkConfig::default();
        config.connector.num_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = NetworkConfig::default();
        config.broker.endpoint = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_env_vars_in_endpoint() {
        std::env::set_var("CAP_TEST_NODE", "node7");
        let mut config = NetworkConfig::default();
        config.broker.endpoint = "inproc://${CAP_TEST_NODE}-broker".to_string();

        config.expand_env_vars().unwrap();

        assert_eq!(config.broker.endpoint, "inproc://node7-broker");
    }
}
