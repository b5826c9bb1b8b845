//! Waiters on a dead producer get a verdict instead of hanging forever.

use assert_matches::assert_matches;
use config::FuturesConfig;
use meridian_e2e_tests::{eventually, TestNode};
use messaging_futures::{FutureError, ShutdownMode};
use std::sync::Arc;
use std::thread;
use transport::InProcessHub;
use types::{BodyId, CallError, NodeAddr, RemoteBody, ResultSlot};

/// Interval far beyond the test window, so only manual sweeps fire.
fn slow_probe_config() -> FuturesConfig {
    FuturesConfig {
        probe_interval_ms: 60_000,
        ..FuturesConfig::default()
    }
}

#[test]
fn dead_producer_force_resolves_its_waiters() {
    let hub = Arc::new(InProcessHub::new());
    let caller = TestNode::start(&hub, "node-caller", slow_probe_config());

    // A producer that was never on the hub: probes can only fail.
    let ghost = RemoteBody::new(BodyId::new(), NodeAddr::new("node-ghost"));
    let handle = caller.runtime().new_future(ghost);

    let waiter_handle = handle.clone();
    let waiter = thread::spawn(move || waiter_handle.get_result::<String>());

    // The first wait put the producer under watch.
    eventually(|| !caller.runtime().monitor().is_idle());

    caller.runtime().monitor().sweep_now();
    let outcome = waiter.join().expect("waiter panicked");
    assert_matches!(
        outcome,
        Err(FutureError::Failed(CallError::ProbeFailure { .. }))
    );

    let metrics = caller.runtime().metrics();
    assert_eq!(metrics.probe_failures, 1);
    assert_eq!(metrics.forced_resolutions, 1);
    assert!(caller.runtime().monitor().is_idle());

    caller.shutdown(ShutdownMode::Discard);
}

#[test]
fn healthy_producer_keeps_its_waiters_pending() {
    let hub = Arc::new(InProcessHub::new());
    let producer = TestNode::start(&hub, "node-producer", slow_probe_config());
    let caller = TestNode::start(&hub, "node-caller-2", slow_probe_config());

    let handle = caller.runtime().new_future(producer.body());
    let waiter_handle = handle.clone();
    let waiter = thread::spawn(move || waiter_handle.get_result::<u32>());
    eventually(|| !caller.runtime().monitor().is_idle());

    // The producer answers its probe; nothing is forced.
    caller.runtime().monitor().sweep_now();
    assert!(handle.is_awaited());
    assert_eq!(caller.runtime().metrics().forced_resolutions, 0);

    caller
        .runtime()
        .deliver(handle.id(), ResultSlot::with_value(11u32))
        .expect("deliver");
    assert_eq!(waiter.join().expect("waiter panicked"), Ok(11));

    producer.shutdown(ShutdownMode::Discard);
    caller.shutdown(ShutdownMode::Discard);
}
