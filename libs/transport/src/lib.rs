//! # CAP Transport
//!
//! In-process transport context for the actor network. The context hands out
//! publishing and subscribing sockets addressed by endpoint name and routes
//! envelopes between them by topic, optionally through a relay.
//!
//! ```rust
//! use cap_transport::{Envelope, TransportContext, TransportSettings};
//! use std::time::Duration;
//!
//! let ctx = TransportContext::new(TransportSettings::default());
//! let inbox = ctx.socket_sub("inproc://bus").unwrap();
//! inbox.subscribe("alice").unwrap();
//!
//! let outbox = ctx.socket_pub("inproc://bus").unwrap();
//! outbox.send(Envelope::text("alice", "hello")).unwrap();
//!
//! let env = inbox.recv_timeout(Duration::from_millis(100)).unwrap().unwrap();
//! assert_eq!(env.payload_str(), Some("hello"));
//! ```

pub mod context;
pub mod envelope;
pub mod error;
pub mod relay;
pub mod socket;
pub mod topic;

// Re-export commonly used types
pub use context::{validate_endpoint, FanOut, TransportContext, TransportSettings};
pub use envelope::Envelope;
pub use error::{Result, TransportError};
pub use relay::RelayBinding;
pub use socket::{PubSocket, SocketId, SubSocket};
pub use topic::TopicFilter;
