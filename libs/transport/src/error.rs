//! Transport Error Types
//!
//! Failures of reply delivery, liveness probing, and in-process routing.

use thiserror::Error;
use types::{BodyId, NodeAddr};

/// Main transport error type
#[derive(Error, Debug)]
pub enum TransportError {
    /// Reply delivery errors
    #[error("Send error: {message} (target: {target:?})")]
    Send {
        message: String,
        target: Option<BodyId>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Liveness probe failures
    #[error("Probe of {addr} failed: {message}")]
    Probe { addr: NodeAddr, message: String },

    /// The peer endpoint went away mid-conversation
    #[error("Endpoint {endpoint} disconnected")]
    Disconnected { endpoint: NodeAddr },

    /// No route is known for the destination node
    #[error("No route to {node}")]
    UnknownDestination { node: NodeAddr },

    /// Generic I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        source: std::io::Error,
    },
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create a send error
    pub fn send(message: impl Into<String>, target: Option<BodyId>) -> Self {
        Self::Send {
            message: message.into(),
            target,
            source: None,
        }
    }

    /// Create a send error with source
    pub fn send_with_source(
        message: impl Into<String>,
        target: Option<BodyId>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Send {
            message: message.into(),
            target,
            source: Some(Box::new(source)),
        }
    }

    /// Create a probe failure
    pub fn probe(addr: NodeAddr, message: impl Into<String>) -> Self {
        Self::Probe {
            addr,
            message: message.into(),
        }
    }

    /// Create a disconnected-endpoint error
    pub fn disconnected(endpoint: NodeAddr) -> Self {
        Self::Disconnected { endpoint }
    }

    /// Create an unknown-destination error
    pub fn unknown_destination(node: NodeAddr) -> Self {
        Self::UnknownDestination { node }
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Send { .. } => true,
            TransportError::Io { .. } => true,
            // a failed probe is itself the verdict, not a step to repeat
            TransportError::Probe { .. } => false,
            TransportError::Disconnected { .. } => false,
            TransportError::UnknownDestination { .. } => false,
        }
    }

    /// Check if this is a transient error
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Send { .. } | TransportError::Io { .. }
        )
    }

    /// Get error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::Send { .. } => "send",
            TransportError::Probe { .. } => "probe",
            TransportError::Disconnected { .. } => "disconnected",
            TransportError::UnknownDestination { .. } => "unknown_destination",
            TransportError::Io { .. } => "io",
        }
    }
}

// Custom Clone implementation since Box<dyn Error> doesn't implement Clone
impl Clone for TransportError {
    fn clone(&self) -> Self {
        match self {
            TransportError::Send {
                message, target, ..
            } => TransportError::Send {
                message: message.clone(),
                target: *target,
                source: None, // Source errors are not cloneable, so we omit them
            },
            TransportError::Probe { addr, message } => TransportError::Probe {
                addr: addr.clone(),
                message: message.clone(),
            },
            TransportError::Disconnected { endpoint } => TransportError::Disconnected {
                endpoint: endpoint.clone(),
            },
            TransportError::UnknownDestination { node } => TransportError::UnknownDestination {
                node: node.clone(),
            },
            TransportError::Io { message, source } => TransportError::Io {
                message: message.clone(),
                source: std::io::Error::new(source.kind(), message.as_str()),
            },
        }
    }
}

/// Convert standard I/O errors to transport errors
impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        TransportError::Io {
            message: error.to_string(),
            source: error,
        }
    }
}
