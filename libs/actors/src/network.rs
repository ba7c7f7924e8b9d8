//! # Actor Network
//!
//! Registry of named actors sharing one transport context and, when it can
//! be started, one relay broker.
//!
//! ## Lifecycle
//!
//! 1. `register` each actor: its receive loop starts immediately
//! 2. `connect`: start the broker (or fall back to brokerless delivery),
//!    then connect every actor in name order
//! 3. `lookup_actor` / `agent_connector_by_topic` / `lookup_termination`
//!    hand out connectors at any point
//! 4. `disconnect`: disconnect every actor, stop the broker, terminate the
//!    context if this network created it
//!
//! Lookup only reads the registry and never touches the transport, so a
//! connector for an unknown topic is cheap and silently useless.

use crate::actor::Actor;
use crate::connector::TopicConnector;
use cap_broker::Broker;
use cap_config::{BrokerSettings, NetworkConfig, TERMINATION_TOPIC};
use cap_transport::{TransportContext, TransportSettings};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Where the network is in its connect/disconnect cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Created,
    Connected,
    Disconnected,
}

pub struct ActorNetwork {
    name: String,
    config: NetworkConfig,
    agents: BTreeMap<String, Box<dyn Actor>>,
    /// Actors replaced by a later registration under the same name
    displaced: Vec<Box<dyn Actor>>,
    context: TransportContext,
    owns_context: bool,
    broker: Option<Broker>,
    state: NetworkState,
}

impl ActorNetwork {
    /// Network with default configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, NetworkConfig::default())
    }

    /// Network named after `config.network.name`
    pub fn from_config(config: NetworkConfig) -> Self {
        let name = config.network.name.clone();
        Self::with_config(name, config)
    }

    pub fn with_config(name: impl Into<String>, config: NetworkConfig) -> Self {
        let context = TransportContext::new(TransportSettings::from(&config));
        Self::build(name.into(), config, context, true)
    }

    /// Network over a context owned by the caller
    ///
    /// The context is shared, not owned: `disconnect` leaves it running.
    /// The broker binds the context's endpoint, whatever `config.broker`
    /// names, since that is where actors and connectors attach.
    pub fn with_context(name: impl Into<String>, config: NetworkConfig, context: TransportContext) -> Self {
        Self::build(name.into(), config, context, false)
    }

    fn build(name: String, config: NetworkConfig, context: TransportContext, owns_context: bool) -> Self {
        if context.endpoint() != config.broker.endpoint {
            warn!(
                network = %name,
                configured = %config.broker.endpoint,
                endpoint = %context.endpoint(),
                "Broker endpoint differs from the context's; binding the context endpoint"
            );
        }
        let broker_settings = BrokerSettings {
            endpoint: context.endpoint().to_string(),
            ..config.broker.clone()
        };
        let broker = Broker::new(context.clone(), &broker_settings);
        info!(network = %name, context = %context.id(), owns_context, "Actor network created");
        Self {
            name,
            config,
            agents: BTreeMap::new(),
            displaced: Vec::new(),
            context,
            owns_context,
            broker: Some(broker),
            state: NetworkState::Created,
        }
    }

    /// Add an actor and start its receive loop
    pub fn register(&mut self, actor: impl Actor + 'static) {
        self.register_boxed(Box::new(actor));
    }

    pub fn register_boxed(&mut self, actor: Box<dyn Actor>) {
        let agent = actor.agent_name().to_string();
        if agent.is_empty() || agent == TERMINATION_TOPIC {
            error!(network = %self.name, agent = %agent, "Rejected actor with reserved or empty name");
            return;
        }

        if let Err(e) = actor.start_recv_thread(&self.context) {
            error!(network = %self.name, agent = %agent, error = %e, "Failed to start actor receive thread");
            return;
        }

        if let Some(previous) = self.agents.insert(agent.clone(), actor) {
            warn!(network = %self.name, agent = %agent, "Actor name already registered; replacing previous entry");
            self.displaced.push(previous);
        }
        debug!(network = %self.name, agent = %agent, "{} registered in the network.", agent);
    }

    /// Start the broker, then connect every registered actor
    ///
    /// A broker that fails to start is dropped and the network carries on
    /// with direct delivery.
    pub fn connect(&mut self) {
        if self.state == NetworkState::Disconnected {
            warn!(network = %self.name, "Network already disconnected; ignoring connect");
            return;
        }

        let broker_started = match self.broker.as_mut() {
            Some(broker) if broker.is_running() => true,
            Some(broker) => broker.start(),
            None => false,
        };
        if !broker_started && self.broker.take().is_some() {
            warn!(network = %self.name, "Broker failed to start; continuing without broker");
        }

        let network: &ActorNetwork = self;
        for actor in network.agents.values() {
            actor.connect(network);
        }

        self.state = NetworkState::Connected;
        info!(
            network = %self.name,
            agents = self.agents.len(),
            broker = self.broker.is_some(),
            "Actor network connected"
        );
    }

    /// Disconnect every actor and release the transport
    ///
    /// Only the first call has any effect.
    pub fn disconnect(&mut self) {
        if self.state == NetworkState::Disconnected {
            debug!(network = %self.name, "Network already disconnected");
            return;
        }

        let network: &ActorNetwork = self;
        for actor in network.agents.values() {
            actor.disconnect(network);
        }
        for actor in &network.displaced {
            actor.disconnect(network);
        }

        if let Some(mut broker) = self.broker.take() {
            broker.stop();
        }
        if self.owns_context {
            self.context.term();
        }

        self.state = NetworkState::Disconnected;
        info!(network = %self.name, "Actor network disconnected");
    }

    /// Connector for any topic, registered or not
    pub fn agent_connector_by_topic(&self, topic: &str) -> TopicConnector {
        TopicConnector::new(self.context.clone(), topic)
            .with_request_timeout(self.config.connector.request_timeout())
    }

    /// Connector for a registered actor; `None` if no actor has that name
    pub fn lookup_actor(&self, name: &str) -> Option<TopicConnector> {
        if !self.agents.contains_key(name) {
            warn!(network = %self.name, agent = name, "{}, not found in the network.", name);
            return None;
        }
        debug!(network = %self.name, agent = name, "[{}] found in the network.", name);
        Some(self.agent_connector_by_topic(name))
    }

    /// Connector for the reserved termination topic
    pub fn lookup_termination(&self) -> TopicConnector {
        self.agent_connector_by_topic(TERMINATION_TOPIC)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    pub fn has_broker(&self) -> bool {
        self.broker.is_some()
    }

    pub fn broker(&self) -> Option<&Broker> {
        self.broker.as_ref()
    }

    /// Registered names in registry order
    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn context(&self) -> &TransportContext {
        &self.context
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}

impl fmt::Display for ActorNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for ActorNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorNetwork")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("agents", &self.agent_names())
            .field("broker", &self.broker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{ActorBehavior, LocalActor};
    use crate::connector::ActorConnector;

    struct Quiet;
    impl ActorBehavior for Quiet {}

    fn quiet(name: &str) -> LocalActor<Quiet> {
        LocalActor::new(name, Quiet).with_poll_interval(std::time::Duration::from_millis(10))
    }

    #[test]
    fn test_registry_order_and_accessors() {
        let mut network = ActorNetwork::new("Test Network");
        assert!(network.is_empty());

        network.register(quiet("zeta"));
        network.register(quiet("alpha"));

        assert_eq!(network.agent_names(), vec!["alpha", "zeta"]);
        assert!(network.contains("zeta"));
        assert_eq!(network.len(), 2);
        assert_eq!(network.to_string(), "Test Network");
        network.disconnect();
    }

    #[test]
    fn test_reserved_names_rejected() {
        let mut network = ActorNetwork::new("Test Network");
        network.register(quiet(""));
        network.register(quiet(TERMINATION_TOPIC));
        assert!(network.is_empty());
    }

    #[test]
    fn test_connectors_bound_to_topic() {
        let network = ActorNetwork::new("Test Network");
        assert_eq!(network.agent_connector_by_topic("anything").topic(), "anything");
        assert_eq!(network.lookup_termination().topic(), TERMINATION_TOPIC);
        assert!(network.lookup_actor("ghost").is_none());
    }

    #[test]
    fn test_disconnect_terminates_owned_context_once() {
        let mut network = ActorNetwork::new("Test Network");
        network.register(quiet("alpha"));
        network.connect();
        assert!(network.has_broker());

        network.disconnect();
        assert!(network.context().is_terminated());
        assert!(!network.has_broker());
        assert_eq!(network.state(), NetworkState::Disconnected);

        network.disconnect();
        network.connect();
        assert_eq!(network.state(), NetworkState::Disconnected);
    }

    #[test]
    fn test_injected_context_endpoint_wins_over_config() {
        let ctx = TransportContext::new(TransportSettings {
            endpoint: "inproc://app-bus".to_string(),
            ..TransportSettings::default()
        });
        let mut network = ActorNetwork::with_context("Shared", NetworkConfig::default(), ctx);
        network.register(quiet("alice"));
        network.connect();

        let broker = network.broker().expect("broker running");
        assert_eq!(broker.endpoint(), "inproc://app-bus");

        network.lookup_actor("alice").unwrap().send_txt_msg("hi").unwrap();
        let relayed = || network.broker().map_or(0, |b| b.stats().envelopes_relayed);
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while relayed() == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(relayed(), 1);
        network.disconnect();
    }

    #[test]
    fn test_shared_context_left_running() {
        let ctx = TransportContext::new(TransportSettings::default());
        let mut network = ActorNetwork::with_context("Shared", NetworkConfig::default(), ctx.clone());
        network.connect();
        network.disconnect();
        assert!(!ctx.is_terminated());
    }
}
