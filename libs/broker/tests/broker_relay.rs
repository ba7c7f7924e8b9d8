//! Broker start/stop contract and forwarding guarantee

use cap_broker::{Broker, BrokerState};
use cap_config::BrokerSettings;
use cap_transport::{Envelope, TransportContext, TransportSettings};
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_millis(500);

fn settings(endpoint: &str) -> BrokerSettings {
    BrokerSettings {
        endpoint: endpoint.to_string(),
        queue_capacity: 128,
    }
}

fn context() -> TransportContext {
    TransportContext::new(TransportSettings {
        mailbox_capacity: 128,
        relay_queue_capacity: 128,
        ..TransportSettings::default()
    })
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_relays_to_matching_subscribers_only() {
    let ctx = context();
    let mut broker = Broker::new(ctx.clone(), &settings("inproc://relay-a"));
    assert!(broker.start());
    assert!(ctx.has_relay("inproc://relay-a"));

    let alice = ctx.socket_sub("inproc://relay-a").unwrap();
    alice.subscribe("alice").unwrap();
    let monitor = ctx.socket_sub("inproc://relay-a").unwrap();
    monitor.subscribe("*").unwrap();
    let outbox = ctx.socket_pub("inproc://relay-a").unwrap();

    outbox.send(Envelope::text("alice", "one")).unwrap();
    outbox.send(Envelope::text("bob", "two")).unwrap();
    outbox.send(Envelope::text("nobody-listens", "three")).unwrap();

    assert_eq!(alice.recv_timeout(WAIT).unwrap().unwrap().payload_str(), Some("one"));
    assert!(alice.recv_timeout(Duration::from_millis(20)).unwrap().is_none());

    let seen: Vec<String> = (0..3)
        .map(|_| monitor.recv_timeout(WAIT).unwrap().unwrap().topic)
        .collect();
    assert_eq!(seen, vec!["alice", "bob", "nobody-listens"]);

    assert!(wait_for(|| broker.stats().envelopes_relayed == 3));
    let stats = broker.stats();
    assert_eq!(stats.deliveries, 4);
    assert_eq!(stats.undeliverable, 0);

    broker.stop();
    assert_eq!(broker.state(), BrokerState::Stopped);
}

#[test]
fn test_second_broker_on_same_endpoint_fails_to_start() {
    let ctx = context();
    let mut first = Broker::new(ctx.clone(), &settings("inproc://relay-b"));
    let mut second = Broker::new(ctx.clone(), &settings("inproc://relay-b"));

    assert!(first.start());
    assert!(!second.start());
    assert_eq!(second.state(), BrokerState::NotStarted);

    // Stopping the broker that never started leaves the running one alone
    second.stop();
    assert!(ctx.has_relay("inproc://relay-b"));
    assert!(first.is_running());
}

#[test]
fn test_start_is_not_repeatable() {
    let ctx = context();
    let mut broker = Broker::new(ctx, &settings("inproc://relay-c"));

    assert!(broker.start());
    assert!(!broker.start());
    broker.stop();
    assert!(!broker.start());
    assert_eq!(broker.state(), BrokerState::Stopped);
}

#[test]
fn test_invalid_endpoint_fails_to_start() {
    let ctx = context();
    let mut broker = Broker::new(ctx, &settings("not-an-endpoint"));
    assert!(!broker.start());
    broker.stop();
    assert_eq!(broker.state(), BrokerState::NotStarted);
}

#[test]
fn test_stop_is_idempotent_and_falls_back_to_direct_delivery() {
    let ctx = context();
    let mut broker = Broker::new(ctx.clone(), &settings("inproc://relay-d"));
    assert!(broker.start());

    let inbox = ctx.socket_sub("inproc://relay-d").unwrap();
    inbox.subscribe("carol").unwrap();
    let outbox = ctx.socket_pub("inproc://relay-d").unwrap();

    broker.stop();
    broker.stop();
    assert!(!ctx.has_relay("inproc://relay-d"));

    outbox.send(Envelope::text("carol", "after stop")).unwrap();
    assert_eq!(
        inbox.recv_timeout(WAIT).unwrap().unwrap().payload_str(),
        Some("after stop")
    );
}

#[test]
fn test_stop_drains_queued_envelopes() {
    let ctx = context();
    let mut broker = Broker::new(ctx.clone(), &settings("inproc://relay-e"));
    let inbox = ctx.socket_sub("inproc://relay-e").unwrap();
    inbox.subscribe("dave").unwrap();
    let outbox = ctx.socket_pub("inproc://relay-e").unwrap();

    assert!(broker.start());
    for i in 0..50u8 {
        outbox
            .send(Envelope::new("dave", "Seq", bytes::Bytes::from(vec![i])))
            .unwrap();
    }
    broker.stop();

    let mut received = 0;
    while inbox.recv_timeout(Duration::from_millis(20)).unwrap().is_some() {
        received += 1;
    }
    assert_eq!(received, 50);
}

#[test]
fn test_context_termination_ends_relay() {
    let ctx = context();
    let mut broker = Broker::new(ctx.clone(), &settings("inproc://relay-f"));
    assert!(broker.start());

    ctx.term();
    // Relay thread exits on its own; stop() just joins it
    broker.stop();
    assert_eq!(broker.state(), BrokerState::Stopped);
}
