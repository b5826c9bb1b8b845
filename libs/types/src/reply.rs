//! Reply values and call outcomes.
//!
//! A completed call produces a [`ResultSlot`]: either a returned value or a
//! [`CallError`], never both. Slots are written once and thereafter only
//! copied; [`ResultSlot::deep_copy`] hands every additional holder an
//! independent value with no shared mutable substructure. Type erasure goes
//! through [`ReplyPayload`], which any `Clone + Send + Debug` value gets for
//! free.

use crate::identity::NodeAddr;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Type-erased reply value. Blanket-implemented for every
/// `Clone + Send + Debug + 'static` type, so callers never implement it by
/// hand; `deep_copy` delegates to `Clone`, which is the value-semantics
/// contract payloads must honor.
pub trait ReplyPayload: Send + fmt::Debug {
    /// Produce an independent copy sharing no mutable state with `self`.
    fn deep_copy(&self) -> Box<dyn ReplyPayload>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T> ReplyPayload for T
where
    T: Clone + Send + fmt::Debug + 'static,
{
    fn deep_copy(&self) -> Box<dyn ReplyPayload> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// What a call came back with. `Application` is the remote method raising;
/// the other variants are synthetic verdicts the runtime injects when it
/// gives up on ever seeing a real reply.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CallError {
    /// The remote method itself failed.
    #[error("remote call failed: {message}")]
    Application { message: String },

    /// No reply arrived within the waited interval; the future was resolved
    /// locally and will never carry the real result.
    #[error("no reply after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// The producer's node stopped answering liveness probes.
    #[error("liveness probe of {addr} failed: {reason}")]
    ProbeFailure { addr: NodeAddr, reason: String },
}

impl CallError {
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
        }
    }

    pub fn timeout(waited: Duration) -> Self {
        Self::Timeout {
            waited_ms: waited.as_millis() as u64,
        }
    }

    pub fn probe_failure(addr: NodeAddr, reason: impl Into<String>) -> Self {
        Self::ProbeFailure {
            addr,
            reason: reason.into(),
        }
    }

    /// True for verdicts injected by the runtime rather than raised by the
    /// remote method.
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::ProbeFailure { .. })
    }

    /// Coarse category for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Application { .. } => "application",
            Self::Timeout { .. } => "timeout",
            Self::ProbeFailure { .. } => "probe_failure",
        }
    }
}

/// The outcome of one completed call: a value, an error, or nothing (a void
/// call that returned cleanly). Written once, then only copied.
#[derive(Debug, Default)]
pub struct ResultSlot {
    value: Option<Box<dyn ReplyPayload>>,
    error: Option<CallError>,
}

impl ResultSlot {
    /// A slot carrying a returned value.
    pub fn with_value<T>(value: T) -> Self
    where
        T: Clone + Send + fmt::Debug + 'static,
    {
        Self {
            value: Some(Box::new(value)),
            error: None,
        }
    }

    /// A slot around an already type-erased payload.
    pub fn from_payload(value: Box<dyn ReplyPayload>) -> Self {
        Self {
            value: Some(value),
            error: None,
        }
    }

    /// A slot carrying a failure outcome.
    pub fn with_error(error: CallError) -> Self {
        Self {
            value: None,
            error: Some(error),
        }
    }

    /// A void call that completed without raising.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&CallError> {
        self.error.as_ref()
    }

    pub fn value(&self) -> Option<&dyn ReplyPayload> {
        self.value.as_deref()
    }

    /// Borrow the value as a concrete type, if it is one.
    pub fn downcast_value<T: 'static>(&self) -> Option<&T> {
        self.value.as_ref().and_then(|v| v.as_any().downcast_ref())
    }

    pub fn into_value(self) -> Option<Box<dyn ReplyPayload>> {
        self.value
    }

    /// Independent copy: the payload is cloned, never shared by reference.
    pub fn deep_copy(&self) -> Self {
        Self {
            value: self.value.as_ref().map(|v| v.deep_copy()),
            error: self.error.clone(),
        }
    }
}
