//! Transport Error Types
//!
//! Errors reported by the transport context and the sockets it hands out.

use thiserror::Error;

/// Main transport error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The owning context was terminated; no socket on it is usable any more
    #[error("Transport context {context} has been terminated")]
    ContextTerminated { context: String },

    /// Operation on a socket after `close()`
    #[error("Socket {socket_id} on {endpoint} is closed")]
    SocketClosed { socket_id: u64, endpoint: String },

    /// Endpoint name is not a valid in-process address
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Another relay is already bound to the endpoint
    #[error("Endpoint {endpoint} already has a relay bound")]
    EndpointInUse { endpoint: String },

    /// Relay queue reached its high-water mark and the envelope was dropped
    #[error("Queue full on {endpoint}: envelope for topic '{topic}' dropped")]
    QueueFull { endpoint: String, topic: String },
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create a context-terminated error
    pub fn context_terminated(context: impl Into<String>) -> Self {
        Self::ContextTerminated {
            context: context.into(),
        }
    }

    /// Create a socket-closed error
    pub fn socket_closed(socket_id: u64, endpoint: impl Into<String>) -> Self {
        Self::SocketClosed {
            socket_id,
            endpoint: endpoint.into(),
        }
    }

    /// Create an invalid-endpoint error
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Create an endpoint-in-use error
    pub fn endpoint_in_use(endpoint: impl Into<String>) -> Self {
        Self::EndpointInUse {
            endpoint: endpoint.into(),
        }
    }

    /// Create a queue-full error
    pub fn queue_full(endpoint: impl Into<String>, topic: impl Into<String>) -> Self {
        Self::QueueFull {
            endpoint: endpoint.into(),
            topic: topic.into(),
        }
    }

    /// True when retrying the same operation can never succeed
    pub fn is_permanent(&self) -> bool {
        !matches!(self, Self::QueueFull { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::socket_closed(7, "inproc://bus");
        assert_eq!(err.to_string(), "Socket 7 on inproc://bus is closed");

        let err = TransportError::queue_full("inproc://bus", "alice");
        assert!(err.to_string().contains("alice"));
    }

    #[test]
    fn test_permanence() {
        assert!(!TransportError::queue_full("inproc://bus", "t").is_permanent());
        assert!(TransportError::context_terminated("ctx").is_permanent());
        assert!(TransportError::endpoint_in_use("inproc://bus").is_permanent());
    }
}
