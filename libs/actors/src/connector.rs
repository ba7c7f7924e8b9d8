//! Topic connectors
//!
//! An [`ActorConnector`] is a handle for publishing to one topic on the
//! network bus. [`TopicConnector`] is the bus-backed implementation handed
//! out by [`crate::ActorNetwork`]; it opens its publish socket lazily on the
//! first send, so creating one performs no I/O.

use crate::error::ConnectorError;
use crate::messages::{Reply, StructuredMessage};
use crate::request::{RequestChannel, RequestExchange, RetryBudget};
use bytes::Bytes;
use cap_config::{service, REPLY_TOPIC_SEPARATOR, TEXT_MSG_TYPE};
use cap_transport::{Envelope, PubSocket, SubSocket, TransportContext};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Publishing handle for a single topic
pub trait ActorConnector: Send + Sync {
    /// Topic this connector publishes to
    fn topic(&self) -> &str;

    /// Publish a text message (type tag `"text"`)
    fn send_txt_msg(&self, text: &str) -> Result<(), ConnectorError>;

    /// Publish an opaque payload under `msg_type`
    fn send_bin_msg(&self, msg_type: &str, payload: &[u8]) -> Result<(), ConnectorError>;

    /// Publish a structured message under its own type tag
    fn send_proto_msg(&self, msg: &dyn StructuredMessage) -> Result<(), ConnectorError>;

    /// Send a request and wait for the correlated reply
    ///
    /// Retries on timeout up to `num_attempts` sends in total. `Ok(None)`
    /// means no reply arrived within any attempt.
    fn send_recv_msg(
        &self,
        msg_type: &str,
        payload: &[u8],
        num_attempts: u32,
    ) -> Result<Option<Reply>, ConnectorError>;

    /// [`ActorConnector::send_recv_msg`] for a structured message
    fn send_recv_proto_msg(
        &self,
        msg: &dyn StructuredMessage,
        num_attempts: u32,
    ) -> Result<Option<Reply>, ConnectorError>;

    /// Release transport resources; later sends return [`ConnectorError::Closed`]
    fn close(&self);
}

pub struct TopicConnector {
    context: TransportContext,
    endpoint: String,
    topic: String,
    request_timeout: Duration,
    publisher: OnceCell<PubSocket>,
    closed: AtomicBool,
}

impl TopicConnector {
    /// Connector on the context's bus endpoint with the default request timeout
    pub fn new(context: TransportContext, topic: impl Into<String>) -> Self {
        let endpoint = context.endpoint().to_string();
        Self {
            context,
            endpoint,
            topic: topic.into(),
            request_timeout: Duration::from_millis(service::connector::REQUEST_TIMEOUT_MS),
            publisher: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Timeout for each request attempt
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), ConnectorError> {
        if self.is_closed() {
            return Err(ConnectorError::closed(&self.topic));
        }
        Ok(())
    }

    fn publisher(&self) -> Result<&PubSocket, ConnectorError> {
        self.ensure_open()?;
        let socket = self.publisher.get_or_try_init(|| {
            debug!(topic = %self.topic, endpoint = %self.endpoint, "Opening connector publish socket");
            self.context.socket_pub(&self.endpoint)
        })?;
        Ok(socket)
    }

    fn publish(&self, msg_type: &str, payload: Bytes) -> Result<(), ConnectorError> {
        let envelope = Envelope::new(self.topic.as_str(), msg_type, payload);
        trace!(topic = %self.topic, msg_type, bytes = envelope.byte_size(), "Publishing");
        self.publisher()?.send(envelope)?;
        Ok(())
    }

    fn request(
        &self,
        msg_type: &str,
        payload: Bytes,
        num_attempts: u32,
    ) -> Result<Option<Reply>, ConnectorError> {
        self.ensure_open()?;
        let budget = RetryBudget::new(num_attempts, self.request_timeout)?;
        let publisher = self.publisher()?;

        let reply_topic = format!("{}{}{}", self.topic, REPLY_TOPIC_SEPARATOR, Uuid::new_v4().simple());
        // Subscribed before the first send so a fast reply is not missed
        let inbox = self.context.socket_sub(&self.endpoint)?;
        inbox.subscribe(&reply_topic)?;

        let mut channel = ReplyChannel {
            publisher,
            inbox: &inbox,
            request: Envelope::new(self.topic.as_str(), msg_type, payload).with_reply_to(reply_topic.as_str()),
        };
        let outcome = RequestExchange::new(budget).run(&mut channel);
        inbox.close();

        if let Ok(None) = outcome {
            debug!(
                topic = %self.topic,
                msg_type,
                attempts = num_attempts,
                max_wait = ?budget.max_wait(),
                "No reply after all attempts"
            );
        }
        outcome
    }
}

impl ActorConnector for TopicConnector {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn send_txt_msg(&self, text: &str) -> Result<(), ConnectorError> {
        self.publish(TEXT_MSG_TYPE, Bytes::copy_from_slice(text.as_bytes()))
    }

    fn send_bin_msg(&self, msg_type: &str, payload: &[u8]) -> Result<(), ConnectorError> {
        self.publish(msg_type, Bytes::copy_from_slice(payload))
    }

    fn send_proto_msg(&self, msg: &dyn StructuredMessage) -> Result<(), ConnectorError> {
        self.ensure_open()?;
        let payload = msg.encode()?;
        self.publish(msg.msg_type(), Bytes::from(payload))
    }

    fn send_recv_msg(
        &self,
        msg_type: &str,
        payload: &[u8],
        num_attempts: u32,
    ) -> Result<Option<Reply>, ConnectorError> {
        self.request(msg_type, Bytes::copy_from_slice(payload), num_attempts)
    }

    fn send_recv_proto_msg(
        &self,
        msg: &dyn StructuredMessage,
        num_attempts: u32,
    ) -> Result<Option<Reply>, ConnectorError> {
        self.ensure_open()?;
        let payload = msg.encode()?;
        self.request(msg.msg_type(), Bytes::from(payload), num_attempts)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(socket) = self.publisher.get() {
            socket.close();
        }
        debug!(topic = %self.topic, "Connector closed");
    }
}

impl std::fmt::Debug for TopicConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicConnector")
            .field("topic", &self.topic)
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.request_timeout)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Request path over the bus: resend the same envelope, wait on a private topic
struct ReplyChannel<'a> {
    publisher: &'a PubSocket,
    inbox: &'a SubSocket,
    request: Envelope,
}

impl RequestChannel for ReplyChannel<'_> {
    fn send_request(&mut self, attempt: u32) -> Result<(), ConnectorError> {
        trace!(topic = %self.request.topic, attempt, "Sending request");
        match self.publisher.send(self.request.clone()) {
            Ok(()) => Ok(()),
            // Transient: the attempt counts as sent and times out like any other
            Err(e) if !e.is_permanent() => {
                warn!(topic = %self.request.topic, attempt, error = %e, "Request not delivered this attempt");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn await_reply(&mut self, timeout: Duration) -> Result<Option<Envelope>, ConnectorError> {
        Ok(self.inbox.recv_timeout(timeout)?)
    }
}
