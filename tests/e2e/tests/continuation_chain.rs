//! A result produced on one node reaches a holder two hops away.
//!
//! The caller forwards a still-pending handle to a downstream node; when the
//! producer answers the caller, the continuation dispatcher pushes the result
//! on to the downstream holder without anyone asking again.

use config::FuturesConfig;
use meridian_e2e_tests::TestNode;
use messaging_futures::{SerializationContext, ShutdownMode, TransferMode};
use std::sync::Arc;
use std::time::Duration;
use transport::{InProcessHub, ReplyEnvelope, ReplySender};
use types::ResultSlot;

#[test]
fn pending_future_follows_the_forward_chain() {
    let hub = Arc::new(InProcessHub::new());
    let producer = TestNode::start(&hub, "node-producer", FuturesConfig::default());
    let caller = TestNode::start(&hub, "node-caller", FuturesConfig::default());
    let downstream = TestNode::start(&hub, "node-downstream", FuturesConfig::default());

    // The caller's future for a call the producer will answer.
    let handle = caller.runtime().new_future(producer.body());

    // The caller ships the still-pending handle onward.
    let ctx = SerializationContext::with_destinations(vec![downstream.body()]);
    let payload = caller
        .runtime()
        .prepare_for_transfer(&handle, TransferMode::Forward, &ctx)
        .expect("forward transfer");
    let far_handle = downstream.runtime().register_incoming(payload);
    assert!(far_handle.is_awaited());
    // The caller, not the producer, is on the hook to push the result here.
    assert_eq!(far_handle.updater(), Some(caller.body()));

    // The producer answers the caller.
    hub.send_reply(
        &ReplyEnvelope::new(
            handle.id(),
            producer.body().id(),
            ResultSlot::with_value("computed".to_string()),
        ),
        &caller.body(),
    )
    .expect("producer reply reaches the caller");

    // Both hops observe the same result.
    handle
        .wait_for(Some(Duration::from_secs(2)))
        .expect("caller resolves");
    assert_eq!(handle.get_result::<String>().as_deref(), Ok("computed"));
    far_handle
        .wait_for(Some(Duration::from_secs(2)))
        .expect("downstream resolves");
    assert_eq!(far_handle.get_result::<String>().as_deref(), Ok("computed"));

    // Exactly one continuation send carried the result downstream.
    assert_eq!(caller.runtime().metrics().continuation_sends, 1);
    assert_eq!(downstream.runtime().metrics().replies_delivered, 1);

    producer.shutdown(ShutdownMode::Discard);
    caller.shutdown(ShutdownMode::Flush);
    downstream.shutdown(ShutdownMode::Discard);
}
