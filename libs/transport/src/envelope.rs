//! The reply envelope and the two outbound seams.
//!
//! An envelope is one resolved result in flight: which future it resolves,
//! which body produced it, and the result slot itself. Envelopes own their
//! slot; forwarding one to several receivers always goes through
//! [`ReplyEnvelope::deep_copy`] so no two receivers ever share payload state.

use crate::error::Result;
use types::{BodyId, FutureId, NodeAddr, RemoteBody, ResultSlot};

/// One resolved result travelling to a holder of the future.
#[derive(Debug)]
pub struct ReplyEnvelope {
    future: FutureId,
    sender: BodyId,
    slot: ResultSlot,
}

impl ReplyEnvelope {
    pub fn new(future: FutureId, sender: BodyId, slot: ResultSlot) -> Self {
        Self {
            future,
            sender,
            slot,
        }
    }

    /// Identity of the future this reply resolves.
    pub fn future(&self) -> FutureId {
        self.future
    }

    /// The body that produced (or forwarded) the result.
    pub fn sender(&self) -> BodyId {
        self.sender
    }

    pub fn slot(&self) -> &ResultSlot {
        &self.slot
    }

    pub fn into_slot(self) -> ResultSlot {
        self.slot
    }

    /// Independent copy for fan-out; payload state is never shared.
    pub fn deep_copy(&self) -> Self {
        Self {
            future: self.future,
            sender: self.sender,
            slot: self.slot.deep_copy(),
        }
    }
}

/// Outbound reply delivery. Implementations must be safe to call from the
/// continuation worker thread; blocking here stalls continuation forwarding
/// for the whole process.
pub trait ReplySender: Send + Sync {
    fn send_reply(&self, reply: &ReplyEnvelope, target: &RemoteBody) -> Result<()>;
}

/// Lightweight liveness check of a producer's node. `Ok(())` means the node
/// answered; any error is treated as "producer gone" by the monitor.
pub trait LivenessProbe: Send + Sync {
    fn probe(&self, addr: &NodeAddr) -> Result<()>;
}
