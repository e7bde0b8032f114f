//! Transport abstraction for the Chatter2 server
//!
//! The core never touches sockets. A transport hands each accepted link to the
//! server as a [`Connection`] and reports its closure with a [`CloseReason`].

use core::fmt;

use crate::errors::TransportError;
use crate::types::ConnectionId;

// ----------------------------------------------------------------------------
// Connection Trait
// ----------------------------------------------------------------------------

/// One transport-level link the server writes lines to
///
/// `write` must not block: implementations queue the line or fail
/// immediately, so a slow peer cannot stall writers serving other sessions.
pub trait Connection: Send + Sync + fmt::Debug {
    /// Stable identity of this link
    fn id(&self) -> ConnectionId;

    /// Queue one line (without trailing newline) for delivery
    fn write(&self, line: &str) -> Result<(), TransportError>;

    /// Whether the link can still carry lines
    fn is_open(&self) -> bool;
}

// ----------------------------------------------------------------------------
// Close Notification
// ----------------------------------------------------------------------------

/// Details a transport reports when a link closes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: Option<String>,
    pub was_clean: bool,
}

impl CloseReason {
    /// Peer closed the link in an orderly way
    pub fn clean() -> Self {
        Self {
            code: 0,
            reason: None,
            was_clean: true,
        }
    }

    /// Link was torn down by an error
    pub fn error<T: Into<String>>(reason: T) -> Self {
        Self {
            code: 1,
            reason: Some(reason.into()),
            was_clean: false,
        }
    }

    /// The client asked to leave with `c2/DISCONNECT`
    pub fn requested() -> Self {
        Self {
            code: 0,
            reason: Some("client requested disconnect".to_string()),
            was_clean: true,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "code {} ({}), clean: {}", self.code, reason, self.was_clean),
            None => write!(f, "code {}, clean: {}", self.code, self.was_clean),
        }
    }
}
