//! # Meridian Shared Types
//!
//! Common vocabulary for the future-resolution subsystem: who created a
//! future, who is expected to resolve it, and what a completed call carries.
//!
//! ## Design Philosophy
//!
//! - **Opaque identity**: bodies are identified by [`BodyId`] (UUID-backed),
//!   futures by [`FutureId`] (creator + per-creator sequence). Neither leaks
//!   transport details.
//! - **Value-semantics results**: a [`ResultSlot`] owns its payload; copying
//!   one never aliases mutable state with the original. The [`ReplyPayload`]
//!   trait carries that contract for type-erased values.
//! - **Outcome vs. machinery**: [`CallError`] describes what a *call* came
//!   back with (an application failure or a synthetic verdict injected by the
//!   runtime). Failures of the plumbing itself live in the consuming crates.
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{BodyId, FutureId, ResultSlot};
//!
//! let creator = BodyId::new();
//! let id = FutureId::new(creator, 1);
//!
//! let slot = ResultSlot::with_value(42u64);
//! let copy = slot.deep_copy();
//! assert_eq!(copy.downcast_value::<u64>(), Some(&42));
//! assert_eq!(id.creator(), creator);
//! ```

pub mod identity;
pub mod reply;

pub use identity::{BodyId, FutureId, NodeAddr, RemoteBody};
pub use reply::{CallError, ReplyPayload, ResultSlot};
