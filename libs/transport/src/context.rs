//! # Transport Context
//!
//! Process-wide communication resource that hands out sockets. Every socket
//! opened against an endpoint name meets the others at a shared *exchange*:
//!
//! ```text
//!   PubSocket ──publish──▶ Exchange ──(relay bound?)──▶ relay queue ──▶ RelayBinding::forward
//!                              │                                            │
//!                              └──────────(no relay: direct fan-out)────────┤
//!                                                                           ▼
//!                                                      SubSocket mailboxes (filtered by topic)
//! ```
//!
//! At most one relay may be bound per endpoint. Without a relay the exchange
//! delivers directly, which keeps a brokerless network usable.
//!
//! # Lock Ordering
//!
//! 1. `exchanges`
//! 2. `Exchange::relay`
//! 3. `Exchange::subscribers`

use crate::envelope::Envelope;
use crate::error::{Result, TransportError};
use crate::relay::RelayBinding;
use crate::socket::{PubSocket, SocketId, SubSocket};
use crate::topic::TopicFilter;
use cap_config::{NetworkConfig, INPROC_SCHEME};
use crossbeam_channel::{Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Bus endpoint and capacities used when opening sockets and binding relays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Endpoint actors and connectors use unless told otherwise
    pub endpoint: String,
    /// Envelopes buffered per subscriber socket
    pub mailbox_capacity: usize,
    /// Envelopes buffered between publishers and a bound relay
    pub relay_queue_capacity: usize,
    /// How long receive loops block before re-checking for shutdown
    pub recv_poll_interval: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::from(&NetworkConfig::default())
    }
}

impl From<&NetworkConfig> for TransportSettings {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            endpoint: config.broker.endpoint.clone(),
            mailbox_capacity: config.actor.mailbox_capacity,
            relay_queue_capacity: config.broker.queue_capacity,
            recv_poll_interval: config.actor.recv_poll_interval(),
        }
    }
}

/// Outcome of delivering one envelope to the subscribers of an exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub dropped: usize,
}

/// Subscriber slot registered on an exchange
pub(crate) struct Subscription {
    pub(crate) id: SocketId,
    pub(crate) filters: RwLock<Vec<TopicFilter>>,
    pub(crate) mailbox: Sender<Envelope>,
}

impl Subscription {
    fn matches(&self, topic: &str) -> bool {
        self.filters.read().iter().any(|filter| filter.matches(topic))
    }
}

/// Relay currently attached to an exchange
struct RelaySlot {
    id: SocketId,
    queue: Sender<Envelope>,
}

/// Rendezvous point for all sockets opened on one endpoint
pub(crate) struct Exchange {
    endpoint: String,
    relay: RwLock<Option<RelaySlot>>,
    subscribers: RwLock<Vec<Arc<Subscription>>>,
}

impl Exchange {
    fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            relay: RwLock::new(None),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Route through the relay if one is bound, otherwise deliver directly
    pub(crate) fn publish(&self, envelope: Envelope) -> Result<()> {
        // Held across the enqueue so a detaching relay never misses an envelope
        let relay = self.relay.read();
        match relay.as_ref() {
            Some(slot) => match slot.queue.try_send(envelope) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(envelope)) => {
                    warn!(
                        endpoint = %self.endpoint,
                        topic = %envelope.topic,
                        "Relay queue full, dropping envelope"
                    );
                    Err(TransportError::queue_full(&self.endpoint, envelope.topic))
                }
                Err(TrySendError::Disconnected(envelope)) => {
                    debug!(endpoint = %self.endpoint, "Relay gone without detaching, delivering directly");
                    self.fan_out(&envelope);
                    Ok(())
                }
            },
            None => {
                self.fan_out(&envelope);
                Ok(())
            }
        }
    }

    /// Deliver to every subscriber whose filters match the envelope topic
    pub(crate) fn fan_out(&self, envelope: &Envelope) -> FanOut {
        let mut outcome = FanOut::default();
        let subscribers = self.subscribers.read();

        for subscriber in subscribers.iter() {
            if !subscriber.matches(&envelope.topic) {
                continue;
            }
            match subscriber.mailbox.try_send(envelope.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    outcome.dropped += 1;
                    warn!(
                        endpoint = %self.endpoint,
                        topic = %envelope.topic,
                        socket_id = subscriber.id,
                        "Subscriber mailbox full, dropping envelope"
                    );
                }
                Err(TrySendError::Disconnected(_)) => {
                    trace!(socket_id = subscriber.id, "Subscriber closing, skipped");
                }
            }
        }

        trace!(
            endpoint = %self.endpoint,
            topic = %envelope.topic,
            delivered = outcome.delivered,
            "Envelope fanned out"
        );
        outcome
    }

    pub(crate) fn attach_relay(&self, id: SocketId, queue: Sender<Envelope>) -> Result<()> {
        let mut relay = self.relay.write();
        if relay.is_some() {
            return Err(TransportError::endpoint_in_use(&self.endpoint));
        }
        *relay = Some(RelaySlot { id, queue });
        Ok(())
    }

    /// Detach the relay with the given id; returns true if it was attached
    pub(crate) fn detach_relay(&self, id: SocketId) -> bool {
        let mut relay = self.relay.write();
        if relay.as_ref().is_some_and(|slot| slot.id == id) {
            *relay = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn has_relay(&self) -> bool {
        self.relay.read().is_some()
    }

    pub(crate) fn add_subscriber(&self, subscription: Arc<Subscription>) {
        self.subscribers.write().push(subscription);
    }

    pub(crate) fn remove_subscriber(&self, id: SocketId) {
        self.subscribers.write().retain(|s| s.id != id);
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    fn shutdown(&self) {
        self.relay.write().take();
        self.subscribers.write().clear();
    }
}

pub(crate) struct ContextInner {
    id: String,
    settings: TransportSettings,
    exchanges: RwLock<HashMap<String, Arc<Exchange>>>,
    terminated: AtomicBool,
    next_socket_id: AtomicU64,
}

impl ContextInner {
    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.is_terminated() {
            Err(TransportError::context_terminated(&self.id))
        } else {
            Ok(())
        }
    }
}

/// Shared handle to the process-wide transport
///
/// Cloning is cheap and every clone refers to the same context. Sockets are
/// not shared: each caller opens its own.
#[derive(Clone)]
pub struct TransportContext {
    inner: Arc<ContextInner>,
}

impl TransportContext {
    /// Create new transport context
    pub fn new(settings: TransportSettings) -> Self {
        let id = format!("ctx-{}", Uuid::new_v4().simple());
        info!(context = %id, ?settings, "Creating transport context");

        Self {
            inner: Arc::new(ContextInner {
                id,
                settings,
                exchanges: RwLock::new(HashMap::new()),
                terminated: AtomicBool::new(false),
                next_socket_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn id(&self) -> &str {
        self.inner.id()
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.inner.settings
    }

    /// Bus endpoint shared by the actors and connectors of this context
    pub fn endpoint(&self) -> &str {
        &self.inner.settings.endpoint
    }

    /// Open a publishing socket on `endpoint`
    pub fn socket_pub(&self, endpoint: &str) -> Result<PubSocket> {
        let exchange = self.exchange(endpoint)?;
        let id = self.next_socket_id();
        trace!(context = %self.inner.id, endpoint, socket_id = id, "Opened pub socket");
        Ok(PubSocket::new(id, Arc::clone(&self.inner), exchange))
    }

    /// Open a subscribing socket on `endpoint` with no subscriptions yet
    pub fn socket_sub(&self, endpoint: &str) -> Result<SubSocket> {
        let exchange = self.exchange(endpoint)?;
        let id = self.next_socket_id();
        let (tx, rx) = crossbeam_channel::bounded(self.inner.settings.mailbox_capacity);

        let subscription = Arc::new(Subscription {
            id,
            filters: RwLock::new(Vec::new()),
            mailbox: tx,
        });
        exchange.add_subscriber(Arc::clone(&subscription));

        trace!(context = %self.inner.id, endpoint, socket_id = id, "Opened sub socket");
        Ok(SubSocket::new(
            id,
            Arc::clone(&self.inner),
            exchange,
            subscription,
            rx,
        ))
    }

    /// Bind the relay side of `endpoint`
    ///
    /// Fails with [`TransportError::EndpointInUse`] if a relay is already bound.
    pub fn bind_relay(&self, endpoint: &str) -> Result<RelayBinding> {
        let exchange = self.exchange(endpoint)?;
        let id = self.next_socket_id();
        let (tx, rx) = crossbeam_channel::bounded(self.inner.settings.relay_queue_capacity);
        exchange.attach_relay(id, tx)?;

        debug!(context = %self.inner.id, endpoint, relay_id = id, "Relay bound");
        Ok(RelayBinding::new(id, exchange, rx))
    }

    /// True if a relay is currently bound on `endpoint`
    pub fn has_relay(&self, endpoint: &str) -> bool {
        self.inner
            .exchanges
            .read()
            .get(endpoint)
            .is_some_and(|exchange| exchange.has_relay())
    }

    /// Number of open subscriber sockets on `endpoint`
    pub fn subscriber_count(&self, endpoint: &str) -> usize {
        self.inner
            .exchanges
            .read()
            .get(endpoint)
            .map_or(0, |exchange| exchange.subscriber_count())
    }

    /// Tear the context down
    ///
    /// Detaches relays and drops every subscription; sockets still held by
    /// callers report [`TransportError::ContextTerminated`] from then on.
    /// Returns false if the context was already terminated.
    pub fn term(&self) -> bool {
        if self.inner.terminated.swap(true, Ordering::AcqRel) {
            debug!(context = %self.inner.id, "Transport context already terminated");
            return false;
        }

        let exchanges: Vec<Arc<Exchange>> =
            self.inner.exchanges.write().drain().map(|(_, e)| e).collect();
        for exchange in &exchanges {
            exchange.shutdown();
        }

        info!(
            context = %self.inner.id,
            exchanges = exchanges.len(),
            "Transport context terminated"
        );
        true
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }

    fn next_socket_id(&self) -> SocketId {
        self.inner.next_socket_id.fetch_add(1, Ordering::Relaxed)
    }

    fn exchange(&self, endpoint: &str) -> Result<Arc<Exchange>> {
        self.inner.ensure_live()?;
        validate_endpoint(endpoint)?;

        if let Some(exchange) = self.inner.exchanges.read().get(endpoint) {
            return Ok(Arc::clone(exchange));
        }

        let mut exchanges = self.inner.exchanges.write();
        // term() may have run between the two locks
        self.inner.ensure_live()?;
        let exchange = exchanges
            .entry(endpoint.to_string())
            .or_insert_with(|| Arc::new(Exchange::new(endpoint)));
        Ok(Arc::clone(exchange))
    }
}

impl fmt::Debug for TransportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportContext")
            .field("id", &self.inner.id)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Check that `endpoint` is an `inproc://name` address
pub fn validate_endpoint(endpoint: &str) -> Result<()> {
    let Some(name) = endpoint.strip_prefix(INPROC_SCHEME) else {
        return Err(TransportError::invalid_endpoint(
            endpoint,
            format!("expected {INPROC_SCHEME}<name>"),
        ));
    };
    if name.is_empty() {
        return Err(TransportError::invalid_endpoint(endpoint, "empty name"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(TransportError::invalid_endpoint(endpoint, "whitespace in name"));
    }
    Ok(())
}
