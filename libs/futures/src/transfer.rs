//! Side effects of moving a handle across body boundaries.
//!
//! Serializing a future is never a passive act here: preparing a handle for
//! transfer decides how the receiving body will eventually see the result.
//! [`TransferMode::Forward`] on a still-pending handle registers every
//! destination as a continuation target, so the result follows the handle as
//! soon as it arrives. With continuation unavailable the transfer degrades to
//! a blocking wait and ships the resolved value. [`TransferMode::Copy`]
//! snapshots whatever is there right now with no registration at all.
//!
//! The inverse operation, [`FuturePool::register_incoming`], rebuilds a live
//! handle from a received [`TransferPayload`] and joins it to the local pool.

use crate::error::FutureError;
use crate::handle::FutureHandle;
use crate::pool::FuturePool;
use tracing::{debug, warn};
use types::{BodyId, FutureId, RemoteBody, ResultSlot};

/// How a handle crosses to another body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Snapshot the current state; the receiver gets no later updates.
    Copy,
    /// Keep the future live; the result is forwarded once known.
    Forward,
}

/// Destinations of the message a handle travels inside. Filled by the caller
/// while assembling the outgoing message.
#[derive(Debug, Default, Clone)]
pub struct SerializationContext {
    destinations: Vec<RemoteBody>,
}

impl SerializationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_destinations(destinations: Vec<RemoteBody>) -> Self {
        Self { destinations }
    }

    pub fn add_destination(&mut self, destination: RemoteBody) {
        self.destinations.push(destination);
    }

    pub fn destinations(&self) -> &[RemoteBody] {
        &self.destinations
    }
}

/// Wire-side image of a handle: identity, provenance stamps, and the slot
/// content when the transfer carries a resolved (or force-resolved) state.
#[derive(Debug)]
pub struct TransferPayload {
    id: FutureId,
    sender: Option<BodyId>,
    updater: Option<RemoteBody>,
    copy_mode: bool,
    slot: Option<ResultSlot>,
}

impl TransferPayload {
    pub fn id(&self) -> FutureId {
        self.id
    }

    pub fn sender(&self) -> Option<BodyId> {
        self.sender
    }

    pub fn updater(&self) -> Option<&RemoteBody> {
        self.updater.as_ref()
    }

    pub fn copy_mode(&self) -> bool {
        self.copy_mode
    }

    pub fn slot(&self) -> Option<&ResultSlot> {
        self.slot.as_ref()
    }

    /// Whether the payload already carries a result.
    pub fn is_resolved(&self) -> bool {
        self.slot.is_some()
    }
}

impl FuturePool {
    /// Prepare `handle` for transfer to the bodies in `ctx`.
    ///
    /// In [`TransferMode::Forward`] a pending handle registers every
    /// destination for continuation and ships pending, stamped with this
    /// body as updater. When continuation is disabled or no destination is
    /// known, the call blocks like a local wait; a wait timeout is not an
    /// error here, the timeout verdict travels in the payload instead.
    pub fn prepare_for_transfer(
        &self,
        handle: &FutureHandle,
        mode: TransferMode,
        ctx: &SerializationContext,
    ) -> Result<TransferPayload, FutureError> {
        let id = handle.id();
        match mode {
            TransferMode::Copy => {
                handle.set_copy_mode(true);
                Ok(TransferPayload {
                    id,
                    sender: handle.sender(),
                    updater: handle.updater(),
                    copy_mode: true,
                    slot: handle.snapshot_slot(),
                })
            }
            TransferMode::Forward => {
                handle.set_copy_mode(false);
                if let Some(slot) = handle.snapshot_slot() {
                    return Ok(TransferPayload {
                        id,
                        sender: handle.sender(),
                        updater: handle.updater(),
                        copy_mode: false,
                        slot: Some(slot),
                    });
                }

                if self.continuation_enabled() && !ctx.destinations().is_empty() {
                    for destination in ctx.destinations() {
                        match self.register_continuation(id, destination.clone()) {
                            Ok(()) => {}
                            Err(FutureError::UnknownIdentity { .. }) => {
                                // Resolved between the snapshot above and the
                                // registration. Ship the result instead.
                                if let Some(slot) = handle.snapshot_slot() {
                                    return Ok(TransferPayload {
                                        id,
                                        sender: handle.sender(),
                                        updater: handle.updater(),
                                        copy_mode: false,
                                        slot: Some(slot),
                                    });
                                }
                                return Err(FutureError::unknown_identity(id));
                            }
                            Err(error) => return Err(error),
                        }
                    }
                    return Ok(TransferPayload {
                        id,
                        sender: Some(self.local().id()),
                        updater: Some(self.local().clone()),
                        copy_mode: false,
                        slot: None,
                    });
                }

                debug!(%id, "no continuation path; transfer blocks until resolved");
                match handle.wait_for(None) {
                    Ok(()) => {}
                    // The verdict is in the slot now; it travels with the
                    // payload rather than failing the transfer.
                    Err(error) if error.is_timeout() => {}
                    Err(error) => return Err(error),
                }
                Ok(TransferPayload {
                    id,
                    sender: handle.sender(),
                    updater: handle.updater(),
                    copy_mode: false,
                    slot: handle.snapshot_slot(),
                })
            }
        }
    }

    /// Rebuild a live handle from a received payload.
    ///
    /// A resolved payload produces an immediately-resolved handle. A pending
    /// one joins this pool and resolves when the forwarded result arrives.
    pub fn register_incoming(&self, payload: TransferPayload) -> FutureHandle {
        let TransferPayload {
            id,
            sender,
            updater,
            copy_mode,
            slot,
        } = payload;

        let handle = self.new_handle(id, updater);
        handle.set_copy_mode(copy_mode);
        match slot {
            Some(slot) => {
                if let Some(sender) = sender {
                    handle.set_sender(sender);
                }
                // A freshly-built handle cannot be resolved yet.
                if let Err(error) = handle.receive_reply(slot) {
                    warn!(%id, %error, "incoming resolved payload discarded");
                }
            }
            None => {
                // Stamps this body as the sender of record for further hops.
                self.register_future(&handle);
            }
        }
        handle
    }
}
