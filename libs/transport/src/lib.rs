//! # Meridian Transport Seams
//!
//! The future-resolution runtime talks to the outside world through exactly
//! two traits: [`ReplySender`] (forward a resolved result to a downstream
//! holder) and [`LivenessProbe`] (ask whether a producer's node still
//! answers). Real deployments wire these to their message transport;
//! [`InProcessHub`] is the in-memory implementation used to connect several
//! runtimes inside one process for tests and demos.
//!
//! Wire encoding of payloads is intentionally absent here: envelopes carry
//! owned [`types::ResultSlot`] values, and every hop that fans an envelope
//! out hands each receiver an independent deep copy.

pub mod envelope;
pub mod error;
pub mod inprocess;
pub mod test_utils;

pub use envelope::{LivenessProbe, ReplyEnvelope, ReplySender};
pub use error::{Result, TransportError};
pub use inprocess::InProcessHub;
