//! A result can outrun the handle it belongs to; the pool bridges the gap.
//!
//! The forwarded result reaches the downstream node while the transfer
//! payload is still "in flight". The pool stashes the orphan and hands it to
//! the registration the moment it arrives.

use config::FuturesConfig;
use meridian_e2e_tests::{eventually, TestNode};
use messaging_futures::{SerializationContext, ShutdownMode, TransferMode};
use std::sync::Arc;
use transport::{InProcessHub, ReplyEnvelope, ReplySender};
use types::ResultSlot;

#[test]
fn result_arriving_before_registration_is_stashed_and_consumed() {
    let hub = Arc::new(InProcessHub::new());
    let producer = TestNode::start(&hub, "node-producer", FuturesConfig::default());
    let caller = TestNode::start(&hub, "node-caller", FuturesConfig::default());
    let downstream = TestNode::start(&hub, "node-downstream", FuturesConfig::default());

    let handle = caller.runtime().new_future(producer.body());
    let ctx = SerializationContext::with_destinations(vec![downstream.body()]);
    let payload = caller
        .runtime()
        .prepare_for_transfer(&handle, TransferMode::Forward, &ctx)
        .expect("forward transfer");

    // The producer answers while the payload still sits in our hands: the
    // forwarded result beats the handle to the downstream node.
    hub.send_reply(
        &ReplyEnvelope::new(
            handle.id(),
            producer.body().id(),
            ResultSlot::with_value(7u64),
        ),
        &caller.body(),
    )
    .expect("producer reply reaches the caller");

    eventually(|| downstream.runtime().pool().stashed_results() == 1);
    assert_eq!(downstream.runtime().metrics().orphan_replies, 1);

    // The handle finally arrives and is resolved on the spot.
    let far_handle = downstream.runtime().register_incoming(payload);
    assert!(far_handle.is_resolved());
    assert_eq!(far_handle.get_result::<u64>(), Ok(7));
    assert_eq!(downstream.runtime().pool().stashed_results(), 0);
    assert_eq!(downstream.runtime().metrics().early_results_consumed, 1);

    producer.shutdown(ShutdownMode::Discard);
    caller.shutdown(ShutdownMode::Flush);
    downstream.shutdown(ShutdownMode::Discard);
}
