//! Service defaults
//!
//! Default values used when a field is missing from the loaded configuration.

/// Network defaults
pub mod network {
    /// Name given to a network when none is supplied
    pub const DEFAULT_NAME: &str = "Local Actor Network";
}

/// Broker defaults
pub mod broker {
    /// Envelopes buffered between publishers and the relay thread
    pub const QUEUE_CAPACITY: usize = 10_000;
}

/// Connector defaults
pub mod connector {
    /// Per-attempt reply timeout (milliseconds)
    pub const REQUEST_TIMEOUT_MS: u64 = 1_000;
}

/// Actor runtime defaults
pub mod actor {
    /// Receive loop poll interval (milliseconds)
    pub const RECV_POLL_INTERVAL_MS: u64 = 100;

    /// Envelopes buffered per subscriber before new ones are dropped
    pub const MAILBOX_CAPACITY: usize = 1_000;
}
