//! Structured messages and request replies
//!
//! A structured message carries its own type tag and knows how to encode
//! itself. Types deriving serde get this for free through [`ProtoMessage`],
//! which encodes with bincode.

use crate::error::ConnectorError;
use bytes::Bytes;
use cap_transport::Envelope;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Message that names its own type and encodes to bytes
///
/// Object safe so connectors can accept `&dyn StructuredMessage`.
pub trait StructuredMessage {
    fn msg_type(&self) -> &str;

    fn encode(&self) -> Result<Vec<u8>, ConnectorError>;
}

/// Serde message with a fixed type tag, encoded with bincode
///
/// ```rust
/// use cap_actors::{decode_proto, ProtoMessage, StructuredMessage};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Ping { seq: u32 }
///
/// impl ProtoMessage for Ping {
///     const MSG_TYPE: &'static str = "Ping";
/// }
///
/// let bytes = Ping { seq: 7 }.encode().unwrap();
/// assert_eq!(decode_proto::<Ping>(&bytes).unwrap(), Ping { seq: 7 });
/// ```
pub trait ProtoMessage: Serialize + DeserializeOwned {
    const MSG_TYPE: &'static str;
}

impl<M: ProtoMessage> StructuredMessage for M {
    fn msg_type(&self) -> &str {
        M::MSG_TYPE
    }

    fn encode(&self) -> Result<Vec<u8>, ConnectorError> {
        bincode::serialize(self).map_err(|e| ConnectorError::codec(M::MSG_TYPE, e))
    }
}

/// Decode a payload produced by [`StructuredMessage::encode`] for `M`
pub fn decode_proto<M: ProtoMessage>(payload: &[u8]) -> Result<M, ConnectorError> {
    bincode::deserialize(payload).map_err(|e| ConnectorError::codec(M::MSG_TYPE, e))
}

/// Response to a request: the topic it arrived on, its type tag and payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub topic: String,
    pub msg_type: String,
    pub payload: Bytes,
}

impl Reply {
    pub fn into_parts(self) -> (String, String, Bytes) {
        (self.topic, self.msg_type, self.payload)
    }

    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Decode the payload as `M`; fails if the type tag does not match
    pub fn decode<M: ProtoMessage>(&self) -> Result<M, ConnectorError> {
        if self.msg_type != M::MSG_TYPE {
            return Err(ConnectorError::codec(
                M::MSG_TYPE,
                format!("reply has type {}", self.msg_type),
            ));
        }
        decode_proto(&self.payload)
    }
}

impl From<Envelope> for Reply {
    fn from(envelope: Envelope) -> Self {
        Self {
            topic: envelope.topic,
            msg_type: envelope.msg_type,
            payload: envelope.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Quote {
        symbol: String,
        bid: u64,
    }

    impl ProtoMessage for Quote {
        const MSG_TYPE: &'static str = "Quote";
    }

    #[test]
    fn test_structured_message_is_object_safe() {
        let quote = Quote {
            symbol: "ABC".to_string(),
            bid: 101,
        };
        let msg: &dyn StructuredMessage = &quote;
        assert_eq!(msg.msg_type(), "Quote");
        assert_eq!(decode_proto::<Quote>(&msg.encode().unwrap()).unwrap(), quote);
    }

    #[test]
    fn test_reply_decode_checks_type() {
        let payload = Quote {
            symbol: "XYZ".to_string(),
            bid: 5,
        }
        .encode()
        .unwrap();

        let reply = Reply::from(Envelope::new("bob_1", "Quote", payload.clone()));
        assert_eq!(reply.decode::<Quote>().unwrap().bid, 5);

        let mistyped = Reply::from(Envelope::new("bob_1", "Other", payload));
        assert!(matches!(
            mistyped.decode::<Quote>(),
            Err(ConnectorError::Codec { .. })
        ));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_proto::<Quote>(&[0x01]).is_err());
    }
}
