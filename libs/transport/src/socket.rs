//! Publishing and subscribing sockets
//!
//! Sockets are owned by a single caller and are not meant to be shared
//! across threads; open one per thread instead.

use crate::context::{ContextInner, Exchange, Subscription};
use crate::envelope::Envelope;
use crate::error::{Result, TransportError};
use crate::topic::TopicFilter;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Unique identifier for sockets and relay bindings within a context
pub type SocketId = u64;

/// Fire-and-forget publishing socket
pub struct PubSocket {
    id: SocketId,
    context: Arc<ContextInner>,
    exchange: Arc<Exchange>,
    closed: AtomicBool,
}

impl PubSocket {
    pub(crate) fn new(id: SocketId, context: Arc<ContextInner>, exchange: Arc<Exchange>) -> Self {
        Self {
            id,
            context,
            exchange,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        self.exchange.endpoint()
    }

    /// Publish an envelope; never blocks
    pub fn send(&self, envelope: Envelope) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::socket_closed(self.id, self.endpoint()));
        }
        self.context.ensure_live()?;

        trace!(
            socket_id = self.id,
            topic = %envelope.topic,
            msg_type = %envelope.msg_type,
            bytes = envelope.byte_size(),
            "Publishing envelope"
        );
        self.exchange.publish(envelope)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for PubSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubSocket")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Subscribing socket with its own bounded mailbox
pub struct SubSocket {
    id: SocketId,
    context: Arc<ContextInner>,
    exchange: Arc<Exchange>,
    subscription: Arc<Subscription>,
    mailbox: Receiver<Envelope>,
    closed: AtomicBool,
}

impl SubSocket {
    pub(crate) fn new(
        id: SocketId,
        context: Arc<ContextInner>,
        exchange: Arc<Exchange>,
        subscription: Arc<Subscription>,
        mailbox: Receiver<Envelope>,
    ) -> Self {
        Self {
            id,
            context,
            exchange,
            subscription,
            mailbox,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        self.exchange.endpoint()
    }

    /// Add a topic filter (`"name"`, `"prefix.*"` or `"*"`)
    pub fn subscribe(&self, pattern: &str) -> Result<()> {
        self.ensure_open()?;
        let filter = TopicFilter::parse(pattern);
        let mut filters = self.subscription.filters.write();
        if !filters.contains(&filter) {
            trace!(socket_id = self.id, %filter, "Subscribed");
            filters.push(filter);
        }
        Ok(())
    }

    /// Remove a previously added topic filter
    pub fn unsubscribe(&self, pattern: &str) -> Result<()> {
        self.ensure_open()?;
        let filter = TopicFilter::parse(pattern);
        self.subscription.filters.write().retain(|f| f != &filter);
        Ok(())
    }

    pub fn filters(&self) -> Vec<TopicFilter> {
        self.subscription.filters.read().clone()
    }

    /// Wait up to `timeout` for the next envelope
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Envelope>> {
        self.ensure_open()?;
        self.context.ensure_live()?;

        match self.mailbox.recv_timeout(timeout) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(RecvTimeoutError::Timeout) => {
                self.context.ensure_live()?;
                Ok(None)
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(TransportError::context_terminated(self.context.id()))
            }
        }
    }

    /// Take an envelope if one is already waiting
    pub fn try_recv(&self) -> Result<Option<Envelope>> {
        self.ensure_open()?;
        self.context.ensure_live()?;
        Ok(self.mailbox.try_recv().ok())
    }

    /// Stop receiving and unregister from the exchange
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.exchange.remove_subscriber(self.id);
            trace!(socket_id = self.id, "Sub socket closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(TransportError::socket_closed(self.id, self.endpoint()))
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for SubSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubSocket")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint())
            .field("filters", &self.filters())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for SubSocket {
    fn drop(&mut self) {
        self.close();
    }
}
