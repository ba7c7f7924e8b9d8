//! Shared helpers for the actor network integration tests

#![allow(dead_code)]

use cap_actors::{ActorBehavior, ActorContext, ActorNetwork};
use cap_config::NetworkConfig;
use cap_transport::Envelope;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::Registry;

pub const REQUEST_TIMEOUT_MS: u64 = 100;

/// Short timeouts so exhausted requests finish quickly
pub fn fast_config() -> NetworkConfig {
    let mut config = NetworkConfig::default();
    config.connector.request_timeout_ms = REQUEST_TIMEOUT_MS;
    config.actor.recv_poll_interval_ms = 10;
    config
}

pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Lifecycle and message log shared between a behavior and the test
#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| e.as_str() == entry).count()
    }
}

/// Records everything it sees, tagged with its own label
pub struct Recorder {
    pub label: String,
    pub journal: Journal,
}

impl Recorder {
    pub fn new(label: &str, journal: &Journal) -> Self {
        Self {
            label: label.to_string(),
            journal: journal.clone(),
        }
    }
}

impl ActorBehavior for Recorder {
    fn on_connect(&mut self, _network: &ActorNetwork) {
        self.journal.push(format!("{}:connect", self.label));
    }

    fn on_disconnect(&mut self, _network: &ActorNetwork) {
        self.journal.push(format!("{}:disconnect", self.label));
    }

    fn on_stop(&mut self, _ctx: &ActorContext<'_>) {
        self.journal.push(format!("{}:stop", self.label));
    }

    fn on_txt_msg(&mut self, _ctx: &ActorContext<'_>, text: &str, _msg: &Envelope) -> bool {
        self.journal.push(format!("{}:text:{}", self.label, text));
        true
    }

    fn on_bin_msg(&mut self, _ctx: &ActorContext<'_>, msg: &Envelope) -> bool {
        self.journal.push(format!("{}:bin:{}", self.label, msg.msg_type));
        true
    }
}

/// Counts requests and answers only the n-th one (or none)
pub struct Responder {
    pub reply_on: Option<u32>,
    pub requests: Arc<AtomicU32>,
}

impl Responder {
    pub fn never(requests: &Arc<AtomicU32>) -> Self {
        Self {
            reply_on: None,
            requests: Arc::clone(requests),
        }
    }

    pub fn on_request(n: u32, requests: &Arc<AtomicU32>) -> Self {
        Self {
            reply_on: Some(n),
            requests: Arc::clone(requests),
        }
    }
}

impl ActorBehavior for Responder {
    fn on_bin_msg(&mut self, ctx: &ActorContext<'_>, msg: &Envelope) -> bool {
        let seen = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reply_on == Some(seen) {
            let _ = ctx.reply(msg, "Answer", seen.to_le_bytes().to_vec());
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
}

/// `tracing` layer that keeps every event for later assertions
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    pub fn subscriber(&self) -> impl Subscriber + Send + Sync {
        Registry::default().with(self.clone())
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.events
            .lock()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.events.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}
