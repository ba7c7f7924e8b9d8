//! Message envelope carried between sockets.

use bytes::Bytes;
use cap_config::TEXT_MSG_TYPE;

/// Wire frame exchanged through a transport context
///
/// `reply_to` names the topic a responder should answer on; it is only set
/// for request/reply exchanges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Destination topic
    pub topic: String,
    /// Message type tag
    pub msg_type: String,
    /// Topic the sender listens on for a reply
    pub reply_to: Option<String>,
    /// Opaque payload
    pub payload: Bytes,
}

impl Envelope {
    pub fn new(
        topic: impl Into<String>,
        msg_type: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            topic: topic.into(),
            msg_type: msg_type.into(),
            reply_to: None,
            payload: payload.into(),
        }
    }

    /// Text envelope tagged with the reserved text message type
    pub fn text(topic: impl Into<String>, text: &str) -> Self {
        Self::new(topic, TEXT_MSG_TYPE, Bytes::copy_from_slice(text.as_bytes()))
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn is_text(&self) -> bool {
        self.msg_type == TEXT_MSG_TYPE
    }

    /// Payload as UTF-8, if it is valid UTF-8
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Approximate in-memory size, used for logging
    pub fn byte_size(&self) -> usize {
        self.topic.len()
            + self.msg_type.len()
            + self.reply_to.as_ref().map_or(0, String::len)
            + self.payload.len()
    }
}
