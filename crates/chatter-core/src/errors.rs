//! Error types for the Chatter2 protocol
//!
//! Each layer reports its own error enum. `ChatterError` covers the
//! failures that escape to the process: transport I/O and configuration.

use crate::session::StateTransitionError;
use crate::types::{ConnectionId, MessageId};

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Errors raised while decoding a `c2/` line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Line does not start with the c2/ prefix")]
    MissingPrefix,
    #[error("Line has an empty message type")]
    MissingType,
}

/// Specific session error types
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session {connection} rejected transition: {source}")]
    Transition {
        connection: ConnectionId,
        #[source]
        source: StateTransitionError,
    },
}

/// Specific message log error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageLogError {
    #[error("Message {id} not found")]
    NotFound { id: MessageId },
}

/// Specific transport error types
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection {connection} is closed")]
    Closed { connection: ConnectionId },
    #[error("Send to connection {connection} failed: buffer full (capacity: {capacity})")]
    BufferFull {
        connection: ConnectionId,
        capacity: usize,
    },
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Core error types for the Chatter2 protocol
#[derive(Debug, thiserror::Error)]
pub enum ChatterError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

impl ChatterError {
    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        ChatterError::Configuration {
            reason: reason.into(),
        }
    }

    /// Whether this error came from the transport layer
    pub fn is_transport(&self) -> bool {
        matches!(self, ChatterError::Transport(_))
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, ChatterError>;
