//! Failure-injecting test doubles for the transport seams.
//!
//! `RecordingSender` captures everything the continuation dispatcher sends
//! and can be told to fail the next send, or every send to a given body.
//! `ScriptedProbe` answers liveness probes from a scripted up/down table and
//! records each probe it served. Both live in the library (not behind
//! `cfg(test)`) so downstream crates can drive their own tests with them.

use crate::envelope::{LivenessProbe, ReplyEnvelope, ReplySender};
use crate::error::{Result, TransportError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use types::{BodyId, FutureId, NodeAddr, RemoteBody};

/// `ReplySender` double that records sends instead of delivering them.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(RemoteBody, ReplyEnvelope)>>,
    fail_next: AtomicBool,
    failing_targets: Mutex<HashSet<BodyId>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail exactly one upcoming send, then behave normally again.
    pub fn fail_next_send(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Fail every send addressed to `target` until restored.
    pub fn fail_sends_to(&self, target: BodyId) {
        self.failing_targets.lock().insert(target);
    }

    pub fn restore_sends_to(&self, target: BodyId) {
        self.failing_targets.lock().remove(&target);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Future identities delivered to `target`, in arrival order.
    pub fn futures_sent_to(&self, target: BodyId) -> Vec<FutureId> {
        self.sent
            .lock()
            .iter()
            .filter(|(body, _)| body.id() == target)
            .map(|(_, envelope)| envelope.future())
            .collect()
    }

    /// Drain the recorded sends for detailed inspection.
    pub fn take_sent(&self) -> Vec<(RemoteBody, ReplyEnvelope)> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl ReplySender for RecordingSender {
    fn send_reply(&self, reply: &ReplyEnvelope, target: &RemoteBody) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(TransportError::send("injected failure", Some(target.id())));
        }
        if self.failing_targets.lock().contains(&target.id()) {
            return Err(TransportError::send(
                "injected per-target failure",
                Some(target.id()),
            ));
        }
        self.sent.lock().push((target.clone(), reply.deep_copy()));
        Ok(())
    }
}

/// `LivenessProbe` double with a scripted up/down table.
#[derive(Default)]
pub struct ScriptedProbe {
    down: Mutex<HashSet<NodeAddr>>,
    probed: Mutex<Vec<NodeAddr>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_down(&self, addr: NodeAddr) {
        self.down.lock().insert(addr);
    }

    pub fn mark_up(&self, addr: &NodeAddr) {
        self.down.lock().remove(addr);
    }

    /// Every probe served, in order.
    pub fn probe_log(&self) -> Vec<NodeAddr> {
        self.probed.lock().clone()
    }

    pub fn probes_of(&self, addr: &NodeAddr) -> usize {
        self.probed.lock().iter().filter(|a| *a == addr).count()
    }
}

impl LivenessProbe for ScriptedProbe {
    fn probe(&self, addr: &NodeAddr) -> Result<()> {
        self.probed.lock().push(addr.clone());
        if self.down.lock().contains(addr) {
            Err(TransportError::probe(addr.clone(), "scripted down"))
        } else {
            Ok(())
        }
    }
}
