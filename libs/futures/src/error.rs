//! Future Machinery Error Types
//!
//! Failures of the resolution machinery itself, kept apart from call
//! outcomes: an application error raised by the remote method travels inside
//! the result slot and resurfaces here only as [`FutureError::Failed`].

use std::time::Duration;
use thiserror::Error;
use types::{CallError, FutureId};

/// Main future machinery error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FutureError {
    /// A blocking wait gave up before the future resolved
    #[error("Timeout: {operation} exceeded {waited_ms}ms")]
    Timeout { operation: String, waited_ms: u64 },

    /// Second resolution attempt for the same future, a protocol violation
    /// surfaced loudly rather than swallowed
    #[error("Future {id} already resolved")]
    AlreadyResolved { id: FutureId },

    /// Continuation registration for an identity with no pending entry
    #[error("No pending future with identity {id}")]
    UnknownIdentity { id: FutureId },

    /// Continuation registration while automatic continuation is disabled
    #[error("Automatic continuation is disabled")]
    ContinuationDisabled,

    /// Typed extraction did not match the stored value
    #[error("Type mismatch reading {id}: expected {expected}")]
    TypeMismatch {
        id: FutureId,
        expected: &'static str,
    },

    /// The call itself failed; the verdict travelled inside the result slot
    #[error("Call failed: {0}")]
    Failed(#[from] CallError),
}

impl FutureError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, waited: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            waited_ms: waited.as_millis() as u64,
        }
    }

    /// Create an already-resolved error
    pub fn already_resolved(id: FutureId) -> Self {
        Self::AlreadyResolved { id }
    }

    /// Create an unknown-identity error
    pub fn unknown_identity(id: FutureId) -> Self {
        Self::UnknownIdentity { id }
    }

    /// Create a type-mismatch error
    pub fn type_mismatch(id: FutureId, expected: &'static str) -> Self {
        Self::TypeMismatch { id, expected }
    }

    /// True when the error is the caller's wait expiring, not a delivery
    /// problem.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Get error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            FutureError::Timeout { .. } => "timeout",
            FutureError::AlreadyResolved { .. } => "already_resolved",
            FutureError::UnknownIdentity { .. } => "unknown_identity",
            FutureError::ContinuationDisabled => "continuation_disabled",
            FutureError::TypeMismatch { .. } => "type_mismatch",
            FutureError::Failed(_) => "call_failed",
        }
    }
}
