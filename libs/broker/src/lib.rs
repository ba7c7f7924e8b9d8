//! # CAP Relay Broker
//!
//! Decouples publishers from subscribers: publishers enqueue onto the
//! broker's endpoint and a dedicated relay thread fans each envelope out to
//! the subscribers whose topic filters match.
//!
//! ```rust
//! use cap_broker::{Broker, BrokerState};
//! use cap_config::BrokerSettings;
//! use cap_transport::{TransportContext, TransportSettings};
//!
//! let ctx = TransportContext::new(TransportSettings::default());
//! let mut broker = Broker::new(ctx.clone(), &BrokerSettings::default());
//!
//! assert!(broker.start());
//! assert_eq!(broker.state(), BrokerState::Running);
//!
//! broker.stop();
//! assert_eq!(broker.state(), BrokerState::Stopped);
//! ```

pub mod broker;
pub mod stats;

pub use broker::{Broker, BrokerState};
pub use stats::{BrokerStats, BrokerStatsSnapshot};
