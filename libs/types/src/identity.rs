//! Identity types: bodies, futures, and the addresses replies travel between.
//!
//! A *body* is one active object (one mailbox, one service thread). Every
//! remote call it issues gets a [`FutureId`] built from the body's own id and
//! a monotonically increasing sequence number, so identities are unique
//! without any global coordination.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a body (active object).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(Uuid);

impl BodyId {
    /// Generate a new unique body ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Rebuild an ID from its underlying UUID (e.g. off the wire).
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BodyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body-{}", self.0.simple())
    }
}

/// Identity of one remote call's future: creator body plus a per-creator
/// sequence number. Immutable once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FutureId {
    creator: BodyId,
    sequence: u64,
}

impl FutureId {
    pub fn new(creator: BodyId, sequence: u64) -> Self {
        Self { creator, sequence }
    }

    /// The body that issued the call this future stands for.
    pub fn creator(&self) -> BodyId {
        self.creator
    }

    /// Position in the creator's call sequence.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for FutureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.creator, self.sequence)
    }
}

/// Location a body can be reached at. Opaque to this subsystem; the transport
/// layer decides what the string means.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeAddr(String);

impl NodeAddr {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A body together with the address it lives at: enough to send it a reply
/// or probe its node for liveness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteBody {
    id: BodyId,
    node: NodeAddr,
}

impl RemoteBody {
    pub fn new(id: BodyId, node: NodeAddr) -> Self {
        Self { id, node }
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn node(&self) -> &NodeAddr {
        &self.node
    }
}

impl fmt::Display for RemoteBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.node)
    }
}
