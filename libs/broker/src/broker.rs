//! # Relay Broker
//!
//! Binds the relay side of the network endpoint and forwards every published
//! envelope to every subscriber whose topic filter matches.
//!
//! ## Lifecycle
//!
//! ```text
//! NotStarted ──start() ok──▶ Running ──stop()──▶ Stopped
//!      │
//!      └──start() fails──▶ NotStarted (caller treats the broker as absent)
//! ```
//!
//! A broker is started at most once; `start()` on a running or stopped broker
//! returns false.
//!
//! ## Shutdown
//!
//! `stop()` detaches the relay first so new publishes go directly to
//! subscribers, then lets the relay thread drain what was already queued
//! before joining it. Nothing accepted by the relay is lost.

use crate::stats::{BrokerStats, BrokerStatsSnapshot};
use cap_config::BrokerSettings;
use cap_transport::{Envelope, RelayBinding, TransportContext};
use crossbeam_channel::{select, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Broker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    NotStarted,
    Running,
    Stopped,
}

/// Relay between publishers and subscribers of one endpoint
pub struct Broker {
    context: TransportContext,
    endpoint: String,
    state: BrokerState,
    binding: Option<Arc<RelayBinding>>,
    shutdown_tx: Option<Sender<()>>,
    relay_thread: Option<JoinHandle<()>>,
    stats: Arc<BrokerStats>,
}

impl Broker {
    pub fn new(context: TransportContext, settings: &BrokerSettings) -> Self {
        Self {
            context,
            endpoint: settings.endpoint.clone(),
            state: BrokerState::NotStarted,
            binding: None,
            shutdown_tx: None,
            relay_thread: None,
            stats: Arc::new(BrokerStats::default()),
        }
    }

    /// Bind the endpoint and start relaying
    ///
    /// Returns false if the endpoint could not be bound (another relay owns
    /// it, the name is invalid, the context is terminated) or the broker was
    /// already started once. Never retries.
    pub fn start(&mut self) -> bool {
        if self.state != BrokerState::NotStarted {
            warn!(endpoint = %self.endpoint, state = ?self.state, "Broker already started once");
            return false;
        }

        let binding = match self.context.bind_relay(&self.endpoint) {
            Ok(binding) => Arc::new(binding),
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Broker failed to bind endpoint");
                return false;
            }
        };

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let relay_binding = Arc::clone(&binding);
        let stats = Arc::clone(&self.stats);

        let spawned = thread::Builder::new()
            .name("cap-broker".to_string())
            .spawn(move || run_relay(&relay_binding, &shutdown_rx, &stats));

        match spawned {
            Ok(handle) => {
                self.binding = Some(binding);
                self.shutdown_tx = Some(shutdown_tx);
                self.relay_thread = Some(handle);
                self.state = BrokerState::Running;
                info!(endpoint = %self.endpoint, "🔗 Broker started");
                true
            }
            Err(e) => {
                binding.detach();
                warn!(endpoint = %self.endpoint, error = %e, "Failed to spawn broker relay thread");
                false
            }
        }
    }

    /// Stop relaying and join the relay thread
    ///
    /// Always succeeds; calling it again, or on a broker that never started,
    /// does nothing.
    pub fn stop(&mut self) {
        if self.state != BrokerState::Running {
            debug!(endpoint = %self.endpoint, state = ?self.state, "Broker not running, nothing to stop");
            return;
        }

        if let Some(binding) = self.binding.take() {
            binding.detach();
        }
        // Dropping the sender wakes the relay loop
        self.shutdown_tx.take();

        if let Some(handle) = self.relay_thread.take() {
            if handle.join().is_err() {
                warn!(endpoint = %self.endpoint, "Broker relay thread panicked");
            }
        }

        self.state = BrokerState::Stopped;
        let stats = self.stats.snapshot();
        info!(
            endpoint = %self.endpoint,
            relayed = stats.envelopes_relayed,
            dropped = stats.dropped,
            "Broker stopped"
        );
    }

    pub fn state(&self) -> BrokerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == BrokerState::Running
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn stats(&self) -> BrokerStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

fn run_relay(binding: &RelayBinding, shutdown_rx: &Receiver<()>, stats: &BrokerStats) {
    debug!(endpoint = %binding.endpoint(), "Relay loop started");

    loop {
        select! {
            recv(binding.queue()) -> msg => match msg {
                Ok(envelope) => relay_one(binding, &envelope, stats),
                // Detached or context terminated, and nothing left queued
                Err(_) => break,
            },
            recv(shutdown_rx) -> _ => break,
        }
    }

    while let Ok(envelope) = binding.queue().try_recv() {
        relay_one(binding, &envelope, stats);
    }

    debug!(
        endpoint = %binding.endpoint(),
        relayed = stats.snapshot().envelopes_relayed,
        "Relay loop ended"
    );
}

fn relay_one(binding: &RelayBinding, envelope: &Envelope, stats: &BrokerStats) {
    let outcome = binding.forward(envelope);
    stats.record(outcome.delivered, outcome.dropped);
    trace!(
        topic = %envelope.topic,
        msg_type = %envelope.msg_type,
        delivered = outcome.delivered,
        "Relayed envelope"
    );
}
