//! Actor and connector error types

use cap_transport::TransportError;
use thiserror::Error;

/// Errors returned by [`crate::ActorConnector`] operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// The connector was closed; it can no longer send
    #[error("Connector for topic '{topic}' is closed")]
    Closed { topic: String },

    /// A request needs at least one attempt
    #[error("Invalid attempt count {0}: at least one attempt is required")]
    InvalidAttempts(u32),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Structured message could not be encoded or decoded
    #[error("Codec error for {msg_type}: {reason}")]
    Codec { msg_type: String, reason: String },
}

impl ConnectorError {
    pub fn closed(topic: impl Into<String>) -> Self {
        Self::Closed {
            topic: topic.into(),
        }
    }

    pub fn codec(msg_type: impl Into<String>, reason: impl ToString) -> Self {
        Self::Codec {
            msg_type: msg_type.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while starting or running an actor
#[derive(Error, Debug)]
pub enum ActorError {
    #[error("Actor {agent} already has a receive thread")]
    AlreadyStarted { agent: String },

    #[error("Failed to spawn receive thread for {agent}: {source}")]
    ThreadSpawn {
        agent: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
