//! Actor contract and the thread-backed local actor
//!
//! The network only relies on the [`Actor`] trait: a name, a receive thread
//! it can start, and connect/disconnect hooks. [`LocalActor`] implements it
//! by running an [`ActorBehavior`] on a dedicated receive thread that listens
//! on the actor's own topic and on the reserved termination topic.
//!
//! ## Receive loop
//!
//! - text messages go to [`ActorBehavior::on_txt_msg`]
//! - every other type goes to [`ActorBehavior::on_bin_msg`]
//! - a handler returning `false` ends the loop
//! - any message on the termination topic ends the loop
//!
//! Handlers run on the receive thread while holding the behavior lock.
//! A handler must not issue a blocking request to its own actor.

use crate::connector::TopicConnector;
use crate::error::{ActorError, ConnectorError};
use crate::network::ActorNetwork;
use bytes::Bytes;
use cap_config::TERMINATION_TOPIC;
use cap_transport::{Envelope, PubSocket, SubSocket, TransportContext};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Participant in an [`ActorNetwork`]
pub trait Actor: Send {
    /// Unique name; also the topic the actor listens on
    fn agent_name(&self) -> &str;

    /// Subscribe and start receiving; called once, at registration
    fn start_recv_thread(&self, context: &TransportContext) -> Result<(), ActorError>;

    /// Called by [`ActorNetwork::connect`] after the broker start attempt
    fn connect(&self, network: &ActorNetwork);

    /// Stop receiving; called by [`ActorNetwork::disconnect`]
    fn disconnect(&self, network: &ActorNetwork);
}

/// Message handlers and lifecycle hooks for a [`LocalActor`]
///
/// Every method has a default, so a behavior only overrides what it handles.
pub trait ActorBehavior: Send + 'static {
    fn on_connect(&mut self, _network: &ActorNetwork) {}

    fn on_disconnect(&mut self, _network: &ActorNetwork) {}

    /// Runs on the receive thread before the first message
    fn on_start(&mut self, _ctx: &ActorContext<'_>) {}

    /// Runs on the receive thread after the loop ends
    fn on_stop(&mut self, _ctx: &ActorContext<'_>) {}

    /// Handle a text message; return false to stop receiving
    ///
    /// `msg` is the full envelope, so a text request can be answered with
    /// [`ActorContext::reply`].
    fn on_txt_msg(&mut self, ctx: &ActorContext<'_>, text: &str, _msg: &Envelope) -> bool {
        info!(agent = ctx.agent_name(), text, "Text message received");
        true
    }

    /// Handle a non-text message; return false to stop receiving
    fn on_bin_msg(&mut self, ctx: &ActorContext<'_>, msg: &Envelope) -> bool {
        info!(
            agent = ctx.agent_name(),
            msg_type = %msg.msg_type,
            bytes = msg.payload.len(),
            "Binary message received"
        );
        true
    }
}

/// What a handler can reach from the receive thread
pub struct ActorContext<'a> {
    agent_name: &'a str,
    outbox: &'a PubSocket,
    transport: &'a TransportContext,
}

impl<'a> ActorContext<'a> {
    pub fn agent_name(&self) -> &str {
        self.agent_name
    }

    pub fn transport(&self) -> &TransportContext {
        self.transport
    }

    /// Answer a request on its reply topic
    ///
    /// Returns `Ok(false)` when the message was not a request.
    pub fn reply(
        &self,
        request: &Envelope,
        msg_type: &str,
        payload: impl Into<Bytes>,
    ) -> Result<bool, ConnectorError> {
        let Some(reply_to) = request.reply_to.as_deref() else {
            debug!(agent = self.agent_name, msg_type = %request.msg_type, "No reply topic on message");
            return Ok(false);
        };
        self.outbox.send(Envelope::new(reply_to, msg_type, payload))?;
        Ok(true)
    }

    /// Publish to any topic on the bus
    pub fn publish(
        &self,
        topic: &str,
        msg_type: &str,
        payload: impl Into<Bytes>,
    ) -> Result<(), ConnectorError> {
        self.outbox.send(Envelope::new(topic, msg_type, payload))?;
        Ok(())
    }

    /// Connector to another topic on the same bus
    pub fn connector(&self, topic: &str) -> TopicConnector {
        TopicConnector::new(self.transport.clone(), topic)
            .with_endpoint(self.outbox.endpoint())
    }
}

/// Actor that runs an [`ActorBehavior`] on its own receive thread
pub struct LocalActor<B: ActorBehavior> {
    name: String,
    endpoint: Option<String>,
    poll_interval: Option<Duration>,
    behavior: Arc<Mutex<B>>,
    running: Arc<AtomicBool>,
    recv_thread: Mutex<Option<JoinHandle<()>>>,
}

impl<B: ActorBehavior> LocalActor<B> {
    pub fn new(name: impl Into<String>, behavior: B) -> Self {
        Self {
            name: name.into(),
            endpoint: None,
            poll_interval: None,
            behavior: Arc::new(Mutex::new(behavior)),
            running: Arc::new(AtomicBool::new(false)),
            recv_thread: Mutex::new(None),
        }
    }

    /// How often the receive loop checks for a stop request while idle
    ///
    /// Defaults to the context's configured interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Listen on `endpoint` instead of the context's bus endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Shared handle to the behavior, for inspecting its state
    pub fn behavior(&self) -> Arc<Mutex<B>> {
        Arc::clone(&self.behavior)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn stop_recv_thread(&self) {
        self.running.store(false, Ordering::Release);
        let handle = self.recv_thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(agent = %self.name, "Receive thread panicked");
            }
        }
    }
}

impl<B: ActorBehavior> Actor for LocalActor<B> {
    fn agent_name(&self) -> &str {
        &self.name
    }

    fn start_recv_thread(&self, context: &TransportContext) -> Result<(), ActorError> {
        let mut slot = self.recv_thread.lock();
        if slot.is_some() {
            return Err(ActorError::AlreadyStarted {
                agent: self.name.clone(),
            });
        }

        let endpoint = self.endpoint.as_deref().unwrap_or(context.endpoint());
        // Subscriptions exist before this returns, so nothing sent after
        // registration is missed
        let inbox = context.socket_sub(endpoint)?;
        inbox.subscribe(&self.name)?;
        inbox.subscribe(TERMINATION_TOPIC)?;
        let outbox = context.socket_pub(endpoint)?;

        let receive_loop = ReceiveLoop {
            agent_name: self.name.clone(),
            inbox,
            outbox,
            transport: context.clone(),
            poll_interval: self
                .poll_interval
                .unwrap_or(context.settings().recv_poll_interval),
            behavior: Arc::clone(&self.behavior),
            running: Arc::clone(&self.running),
        };

        self.running.store(true, Ordering::Release);
        let handle = thread::Builder::new()
            .name(format!("actor-{}", self.name))
            .spawn(move || receive_loop.run())
            .map_err(|source| {
                self.running.store(false, Ordering::Release);
                ActorError::ThreadSpawn {
                    agent: self.name.clone(),
                    source,
                }
            })?;
        *slot = Some(handle);

        debug!(agent = %self.name, endpoint, "Receive thread started");
        Ok(())
    }

    fn connect(&self, network: &ActorNetwork) {
        debug!(agent = %self.name, network = %network.name(), "Connecting");
        self.behavior.lock().on_connect(network);
    }

    fn disconnect(&self, network: &ActorNetwork) {
        self.stop_recv_thread();
        self.behavior.lock().on_disconnect(network);
        info!(agent = %self.name, network = %network.name(), "Disconnected");
    }
}

impl<B: ActorBehavior> Drop for LocalActor<B> {
    fn drop(&mut self) {
        self.stop_recv_thread();
    }
}

impl<B: ActorBehavior> std::fmt::Debug for LocalActor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalActor")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

struct ReceiveLoop<B: ActorBehavior> {
    agent_name: String,
    inbox: SubSocket,
    outbox: PubSocket,
    transport: TransportContext,
    poll_interval: Duration,
    behavior: Arc<Mutex<B>>,
    running: Arc<AtomicBool>,
}

impl<B: ActorBehavior> ReceiveLoop<B> {
    fn run(self) {
        let ctx = ActorContext {
            agent_name: &self.agent_name,
            outbox: &self.outbox,
            transport: &self.transport,
        };
        self.behavior.lock().on_start(&ctx);

        while self.running.load(Ordering::Acquire) {
            match self.inbox.recv_timeout(self.poll_interval) {
                Ok(Some(envelope)) => {
                    if !self.dispatch(&ctx, &envelope) {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(agent = %self.agent_name, error = %e, "Receive loop stopping on transport error");
                    break;
                }
            }
        }

        self.behavior.lock().on_stop(&ctx);
        self.inbox.close();
        self.outbox.close();
        self.running.store(false, Ordering::Release);
        debug!(agent = %self.agent_name, "Receive loop ended");
    }

    fn dispatch(&self, ctx: &ActorContext<'_>, envelope: &Envelope) -> bool {
        if envelope.topic == TERMINATION_TOPIC {
            info!(agent = %self.agent_name, msg_type = %envelope.msg_type, "Termination received");
            return false;
        }

        let mut behavior = self.behavior.lock();
        if envelope.is_text() {
            match envelope.payload_str() {
                Some(text) => behavior.on_txt_msg(ctx, text, envelope),
                None => {
                    warn!(agent = %self.agent_name, "Dropping text message with invalid UTF-8");
                    true
                }
            }
        } else {
            behavior.on_bin_msg(ctx, envelope)
        }
    }
}
