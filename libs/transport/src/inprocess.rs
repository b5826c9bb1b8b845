//! In-process loopback hub.
//!
//! Routes reply envelopes between runtimes living in the same process, one
//! unbounded channel per registered node address. Liveness probing is
//! membership: an address answers while its endpoint is registered. This is
//! the transport used by the integration tests and by embedders who colocate
//! several bodies in one process.

use crate::envelope::{LivenessProbe, ReplyEnvelope, ReplySender};
use crate::error::{Result, TransportError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use dashmap::DashMap;
use tracing::debug;
use types::{NodeAddr, RemoteBody};

/// Endpoint table mapping node addresses to their inbound reply queues.
#[derive(Default)]
pub struct InProcessHub {
    endpoints: DashMap<NodeAddr, Sender<ReplyEnvelope>>,
}

impl InProcessHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint for `addr`, returning the receiving side the
    /// node drains. Re-registering an address replaces the old endpoint.
    pub fn register(&self, addr: NodeAddr) -> Receiver<ReplyEnvelope> {
        let (tx, rx) = unbounded();
        debug!(%addr, "registering in-process endpoint");
        self.endpoints.insert(addr, tx);
        rx
    }

    /// Drop the endpoint for `addr`. Subsequent sends fail and probes report
    /// the node as gone.
    pub fn unregister(&self, addr: &NodeAddr) -> bool {
        let removed = self.endpoints.remove(addr).is_some();
        if removed {
            debug!(%addr, "unregistered in-process endpoint");
        }
        removed
    }

    pub fn is_registered(&self, addr: &NodeAddr) -> bool {
        self.endpoints.contains_key(addr)
    }
}

impl ReplySender for InProcessHub {
    fn send_reply(&self, reply: &ReplyEnvelope, target: &RemoteBody) -> Result<()> {
        let endpoint = self
            .endpoints
            .get(target.node())
            .ok_or_else(|| TransportError::unknown_destination(target.node().clone()))?;

        // each receiver gets its own copy; the caller keeps the original
        endpoint
            .send(reply.deep_copy())
            .map_err(|_| TransportError::disconnected(target.node().clone()))
    }
}

impl LivenessProbe for InProcessHub {
    fn probe(&self, addr: &NodeAddr) -> Result<()> {
        if self.endpoints.contains_key(addr) {
            Ok(())
        } else {
            Err(TransportError::probe(addr.clone(), "no endpoint registered"))
        }
    }
}
