//! Relay side of an endpoint
//!
//! A [`RelayBinding`] receives every envelope published on its endpoint and
//! decides when to forward it. Dropping or detaching the binding switches the
//! endpoint back to direct delivery.

use crate::context::{Exchange, FanOut};
use crate::envelope::Envelope;
use crate::socket::SocketId;
use crossbeam_channel::Receiver;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub struct RelayBinding {
    id: SocketId,
    exchange: Arc<Exchange>,
    queue: Receiver<Envelope>,
}

impl RelayBinding {
    pub(crate) fn new(id: SocketId, exchange: Arc<Exchange>, queue: Receiver<Envelope>) -> Self {
        Self {
            id,
            exchange,
            queue,
        }
    }

    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        self.exchange.endpoint()
    }

    /// Envelopes published while this relay is attached
    pub fn queue(&self) -> &Receiver<Envelope> {
        &self.queue
    }

    /// Deliver one envelope to the endpoint's subscribers
    pub fn forward(&self, envelope: &Envelope) -> FanOut {
        self.exchange.fan_out(envelope)
    }

    /// Stop intercepting publishes; queued envelopes stay readable
    ///
    /// Returns false if this binding was already detached.
    pub fn detach(&self) -> bool {
        let detached = self.exchange.detach_relay(self.id);
        if detached {
            debug!(endpoint = %self.endpoint(), relay_id = self.id, "Relay detached");
        }
        detached
    }
}

impl fmt::Debug for RelayBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayBinding")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint())
            .field("queued", &self.queue.len())
            .finish()
    }
}

impl Drop for RelayBinding {
    fn drop(&mut self) {
        self.detach();
    }
}
