//! Relay counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the relay thread
#[derive(Debug, Default)]
pub struct BrokerStats {
    pub envelopes_relayed: AtomicU64,
    pub deliveries: AtomicU64,
    pub dropped: AtomicU64,
    /// Envelopes no subscriber matched
    pub undeliverable: AtomicU64,
}

impl BrokerStats {
    pub fn record(&self, delivered: usize, dropped: usize) {
        self.envelopes_relayed.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        self.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        if delivered == 0 && dropped == 0 {
            self.undeliverable.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> BrokerStatsSnapshot {
        BrokerStatsSnapshot {
            envelopes_relayed: self.envelopes_relayed.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            undeliverable: self.undeliverable.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`BrokerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStatsSnapshot {
    pub envelopes_relayed: u64,
    pub deliveries: u64,
    pub dropped: u64,
    pub undeliverable: u64,
}
