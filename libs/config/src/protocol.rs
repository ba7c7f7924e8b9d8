//! Actor protocol constants
//!
//! Reserved topics and message type tags understood by every actor on the
//! network. Changing any of these breaks interoperability between actors
//! built against different versions.

/// Reserved topic used to broadcast shutdown to every actor.
///
/// Never a valid actor name: the network refuses to register it.
pub const TERMINATION_TOPIC: &str = "Termination";

/// Message type tag for UTF-8 text payloads.
pub const TEXT_MSG_TYPE: &str = "text";

/// Message type tag conventionally sent on [`TERMINATION_TOPIC`].
pub const TERMINATE_MSG_TYPE: &str = "Terminate";

/// Default number of send attempts for request/reply exchanges.
pub const DEFAULT_NUM_ATTEMPTS: u32 = 5;

/// Scheme prefix for in-process endpoints.
pub const INPROC_SCHEME: &str = "inproc://";

/// Endpoint the broker binds when nothing else is configured.
pub const DEFAULT_BROKER_ENDPOINT: &str = "inproc://cap-broker";

/// Separator between a request topic and its per-request reply suffix.
pub const REPLY_TOPIC_SEPARATOR: char = '_';

/// Topic filter patterns
pub mod topics {
    /// Subscribes to every topic.
    pub const WILDCARD_ALL: &str = "*";

    /// Suffix turning a filter into a prefix match (`"sensors.*"`).
    pub const WILDCARD_SUFFIX: &str = ".*";
}
