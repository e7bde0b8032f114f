//! Chatter2 Core Protocol Implementation
//!
//! This crate provides the foundational pieces of the Chatter2 chat server:
//! the `c2/` line codec, the closed command set, per-connection sessions with
//! their lifecycle state machine, and the keyed message log. It knows nothing
//! about sockets; transports plug in through the [`Connection`] trait.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod message_log;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{EditPolicy, ServerConfig};
pub use errors::{
    ChatterError, CodecError, MessageLogError, Result, SessionError,
    TransportError,
};
pub use message_log::{MessageEntry, MessageLog, MessageLogStats};
pub use protocol::{
    Command, ErrorCode, Notification, Query, RawMessage, ServerMessage, UpdateRequest,
};
pub use session::{Session, SessionEvent, SessionSnapshot, SessionState, StateTransitionError};
pub use transport::{CloseReason, Connection};
pub use types::{ConnectionId, MessageId, ServerIdentity, Timestamp};
