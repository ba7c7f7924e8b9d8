//! Integration tests for the transport context
//!
//! Exercises sockets from several threads sharing one context, with and
//! without a relay bound on the endpoint.

use cap_transport::{Envelope, TransportContext, TransportError, TransportSettings};
use std::thread;
use std::time::Duration;

const BUS: &str = "inproc://integration-bus";
const WAIT: Duration = Duration::from_millis(500);

fn context() -> TransportContext {
    TransportContext::new(TransportSettings {
        mailbox_capacity: 64,
        relay_queue_capacity: 64,
        ..TransportSettings::default()
    })
}

#[test]
fn test_concurrent_publishers_preserve_per_publisher_order() {
    let ctx = context();
    let inbox = ctx.socket_sub(BUS).unwrap();
    inbox.subscribe("orders.*").unwrap();

    let handles: Vec<_> = (0..2)
        .map(|publisher_idx| {
            let ctx = ctx.clone();
            thread::spawn(move || {
                let outbox = ctx.socket_pub(BUS).unwrap();
                for seq in 0..10u8 {
                    let topic = format!("orders.p{publisher_idx}");
                    outbox.send(Envelope::new(topic, "Seq", vec![seq])).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut last_seen = [None::<u8>; 2];
    for _ in 0..20 {
        let env = inbox.recv_timeout(WAIT).unwrap().expect("envelope");
        let idx = if env.topic == "orders.p0" { 0 } else { 1 };
        let seq = env.payload[0];
        if let Some(prev) = last_seen[idx] {
            assert!(seq > prev, "out of order on {}: {} after {}", env.topic, seq, prev);
        }
        last_seen[idx] = Some(seq);
    }
    assert_eq!(last_seen, [Some(9), Some(9)]);
}

#[test]
fn test_relay_intercepts_until_detached() {
    let ctx = context();
    let inbox = ctx.socket_sub(BUS).unwrap();
    inbox.subscribe("bob").unwrap();
    let outbox = ctx.socket_pub(BUS).unwrap();

    let relay = ctx.bind_relay(BUS).unwrap();
    outbox.send(Envelope::text("bob", "via relay")).unwrap();

    // Nothing reaches the subscriber until the relay forwards it
    assert!(inbox.recv_timeout(Duration::from_millis(20)).unwrap().is_none());

    let queued = relay.queue().recv_timeout(WAIT).unwrap();
    let outcome = relay.forward(&queued);
    assert_eq!(outcome.delivered, 1);
    assert_eq!(
        inbox.recv_timeout(WAIT).unwrap().unwrap().payload_str(),
        Some("via relay")
    );

    relay.detach();
    outbox.send(Envelope::text("bob", "direct")).unwrap();
    assert_eq!(
        inbox.recv_timeout(WAIT).unwrap().unwrap().payload_str(),
        Some("direct")
    );
}

#[test]
fn test_full_relay_queue_reports_error() {
    let ctx = TransportContext::new(TransportSettings {
        mailbox_capacity: 8,
        relay_queue_capacity: 2,
        ..TransportSettings::default()
    });
    let _relay = ctx.bind_relay(BUS).unwrap();
    let outbox = ctx.socket_pub(BUS).unwrap();

    outbox.send(Envelope::text("t", "1")).unwrap();
    outbox.send(Envelope::text("t", "2")).unwrap();
    let err = outbox.send(Envelope::text("t", "3")).unwrap_err();

    assert!(matches!(err, TransportError::QueueFull { .. }));
    assert!(!err.is_permanent());
}

#[test]
fn test_endpoints_are_isolated() {
    let ctx = context();
    let inbox = ctx.socket_sub("inproc://left").unwrap();
    inbox.subscribe("*").unwrap();
    let outbox = ctx.socket_pub("inproc://right").unwrap();

    outbox.send(Envelope::text("anything", "x")).unwrap();
    assert!(inbox.recv_timeout(Duration::from_millis(20)).unwrap().is_none());
}

#[test]
fn test_invalid_endpoint_rejected() {
    let ctx = context();
    assert!(matches!(
        ctx.socket_pub("tcp://127.0.0.1:5555"),
        Err(TransportError::InvalidEndpoint { .. })
    ));
    assert!(matches!(
        ctx.bind_relay(""),
        Err(TransportError::InvalidEndpoint { .. })
    ));
}
