//! Chatter2 Server Runtime
//!
//! This crate contains the server engine built on `chatter-core`:
//! - `SessionRegistry`: shared map of live sessions and broadcast fan-out
//! - `Dispatcher`: turns decoded commands into registry/log mutations and replies
//! - `ChatServer`: the `on_connect` / `on_line` / `on_close` facade transports call
//! - `HeartbeatTask`: per-connection server PING schedule
//! - `TcpChatListener`: newline-delimited TCP transport

pub mod heartbeat;
pub mod listener;
pub mod logic;
pub mod managers;
mod server;

pub use heartbeat::{HeartbeatHandle, HeartbeatTask};
pub use listener::{TcpChatListener, TcpConnection};
pub use logic::{DispatchOutcome, Dispatcher};
pub use managers::{BroadcastReport, SessionRegistry, StateDistribution};
pub use server::{ChatServer, ServerStats};

// Re-export core types for convenience
pub use chatter_core::{
    ChatterError, CloseReason, Command, Connection, ConnectionId, EditPolicy,
    MessageId, ServerConfig, ServerMessage, Session, SessionState,
};
