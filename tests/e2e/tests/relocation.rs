//! A body hands its undelivered continuation backlog to its successor.
//!
//! The original node's outgoing link is gated shut, so the first batch wedges
//! in flight and the second stays queued. A Preserve shutdown finishes the
//! in-flight batch, returns the queued one, and a successor node adopts it.

use config::FuturesConfig;
use meridian_e2e_tests::{eventually, GatedSender, TestNode};
use messaging_futures::{SerializationContext, ShutdownMode, TransferMode};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use transport::{InProcessHub, ReplySender};
use types::{BodyId, NodeAddr, RemoteBody, ResultSlot};

#[test]
fn preserved_backlog_is_adopted_by_a_successor() {
    let hub = Arc::new(InProcessHub::new());
    let downstream = TestNode::start(&hub, "node-downstream", FuturesConfig::default());

    let gate = GatedSender::closed(Arc::clone(&hub));
    let original = TestNode::start_with_transport(
        &hub,
        "node-original",
        FuturesConfig::default(),
        Arc::clone(&gate) as Arc<dyn ReplySender>,
    );

    // Two pending futures, both forwarded to the downstream node.
    let worker = RemoteBody::new(BodyId::new(), NodeAddr::new("node-worker"));
    let first = original.runtime().new_future(worker.clone());
    let second = original.runtime().new_future(worker);
    let ctx = SerializationContext::with_destinations(vec![downstream.body()]);
    let first_payload = original
        .runtime()
        .prepare_for_transfer(&first, TransferMode::Forward, &ctx)
        .expect("forward first");
    let second_payload = original
        .runtime()
        .prepare_for_transfer(&second, TransferMode::Forward, &ctx)
        .expect("forward second");
    let far_first = downstream.runtime().register_incoming(first_payload);
    let far_second = downstream.runtime().register_incoming(second_payload);

    // Results arrive. The first batch wedges in the gated link; the second
    // waits behind it.
    original
        .runtime()
        .deliver(first.id(), ResultSlot::with_value(1u32))
        .expect("deliver first");
    original
        .runtime()
        .deliver(second.id(), ResultSlot::with_value(2u32))
        .expect("deliver second");
    eventually(|| original.runtime().pending_continuation_batches() == 1);

    // Preserve-shutdown drains the queue, then waits for the wedged send.
    let original_runtime = Arc::clone(original.runtime());
    let stopper = thread::spawn(move || original.shutdown(ShutdownMode::Preserve));
    eventually(|| original_runtime.pending_continuation_batches() == 0);
    gate.open();
    let preserved = stopper.join().expect("shutdown thread panicked");

    assert_eq!(preserved.len(), 1);
    assert_eq!(preserved[0].reply().future(), second.id());

    // The in-flight result made it out before the handover.
    far_first
        .wait_for(Some(Duration::from_secs(2)))
        .expect("first resolves");
    assert_eq!(far_first.get_result::<u32>(), Ok(1));
    assert!(far_second.is_awaited());

    // The successor adopts the backlog; the second result follows.
    let successor = TestNode::start(&hub, "node-successor", FuturesConfig::default());
    assert_eq!(successor.runtime().adopt(preserved), 1);
    far_second
        .wait_for(Some(Duration::from_secs(2)))
        .expect("second resolves");
    assert_eq!(far_second.get_result::<u32>(), Ok(2));

    downstream.shutdown(ShutdownMode::Discard);
    successor.shutdown(ShutdownMode::Flush);
}
