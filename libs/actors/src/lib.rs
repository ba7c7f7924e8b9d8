//! # CAP Actors
//!
//! Messaging substrate for a network of named actors: a registry that starts
//! each actor's receive loop, topic connectors for fire-and-forget and
//! retrying request/reply messaging, and a reserved termination topic for
//! network-wide shutdown.
//!
//! ## Quick start
//!
//! ```rust
//! use cap_actors::{ActorBehavior, ActorConnector, ActorContext, ActorNetwork, LocalActor};
//! use cap_transport::Envelope;
//!
//! struct Echo;
//!
//! impl ActorBehavior for Echo {
//!     fn on_bin_msg(&mut self, ctx: &ActorContext<'_>, msg: &Envelope) -> bool {
//!         let _ = ctx.reply(msg, "Echo", msg.payload.clone());
//!         true
//!     }
//! }
//!
//! let mut network = ActorNetwork::new("Docs Network");
//! network.register(LocalActor::new("echo", Echo));
//! network.connect();
//!
//! let echo = network.lookup_actor("echo").unwrap();
//! let reply = echo.send_recv_msg("Ping", b"hello", 5).unwrap().unwrap();
//! assert_eq!(reply.payload.as_ref(), b"hello");
//!
//! network.disconnect();
//! ```

pub mod actor;
pub mod connector;
pub mod error;
pub mod messages;
pub mod network;
pub mod request;

pub use actor::{Actor, ActorBehavior, ActorContext, LocalActor};
pub use connector::{ActorConnector, TopicConnector};
pub use error::{ActorError, ConnectorError};
pub use messages::{decode_proto, ProtoMessage, Reply, StructuredMessage};
pub use network::{ActorNetwork, NetworkState};
pub use request::{ExchangeState, RequestChannel, RequestExchange, RetryBudget};

pub use cap_config::{DEFAULT_NUM_ATTEMPTS, TERMINATION_TOPIC};
