//! # CAP Centralized Configuration
//!
//! Configuration management and protocol constants shared by every crate of
//! the actor network, so topic names and defaults live in exactly one place.
//!
//! ## Features
//!
//! - **Protocol Constants**: reserved termination topic, message type tags,
//!   default request/reply attempt budget
//! - **Service Defaults**: broker endpoint, queue capacities, timeouts
//! - **Network Configuration**: layered TOML + environment loading
//!
//! ## Usage
//!
//! ```rust
//! use cap_config::{protocol, NetworkConfig};
//!
//! let config = NetworkConfig::default();
//! assert_eq!(config.connector.num_attempts, protocol::DEFAULT_NUM_ATTEMPTS);
//! assert_eq!(protocol::TERMINATION_TOPIC, "Termination");
//! ```

pub mod network_config;
pub mod protocol;
pub mod service;

// Re-export commonly used types
pub use network_config::{
    load_config, ActorSettings, BrokerSettings, ConnectorSettings, NetworkConfig, NetworkSettings,
};
pub use protocol::*;
