//! Per-connection sessions
//!
//! Provides the linear session lifecycle (`Connecting -> Connected ->
//! Disconnected`) as a pure transition function, and the [`Session`] object
//! that owns one connection's username and state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::errors::{SessionError, TransportError};
use crate::protocol::ServerMessage;
use crate::transport::Connection;
use crate::types::{ConnectionId, Timestamp};

// ----------------------------------------------------------------------------
// Session State Machine
// ----------------------------------------------------------------------------

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Accepted by the transport, no CONNECT yet
    Connecting,
    /// Completed CONNECT; visible to queries and broadcasts
    Connected,
    /// Terminal
    Disconnected,
}

/// Events that drive session transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Successful `CONNECT <username>`
    Connect,
    /// `UPDATE username; <new>`
    Rename,
    /// Transport close or explicit disconnect
    Close,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Connect => "Connect",
            SessionEvent::Rename => "Rename",
            SessionEvent::Close => "Close",
        }
    }
}

/// Rejected state transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateTransitionError {
    #[error("Invalid transition from {from_state}: event {event} not allowed")]
    InvalidTransition {
        from_state: &'static str,
        event: &'static str,
    },
}

impl SessionState {
    /// Name for logging and errors
    pub fn state_name(&self) -> &'static str {
        match self {
            SessionState::Connecting => "Connecting",
            SessionState::Connected => "Connected",
            SessionState::Disconnected => "Disconnected",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Disconnected)
    }

    /// Compute the state that follows `event`
    ///
    /// `Close` is accepted from every state, including `Disconnected`, so
    /// repeated close notifications are harmless.
    pub fn transition(self, event: SessionEvent) -> Result<SessionState, StateTransitionError> {
        match (self, event) {
            (SessionState::Connecting, SessionEvent::Connect) => Ok(SessionState::Connected),
            (SessionState::Connected, SessionEvent::Rename) => Ok(SessionState::Connected),
            (_, SessionEvent::Close) => Ok(SessionState::Disconnected),
            (state, event) => Err(StateTransitionError::InvalidTransition {
                from_state: state.state_name(),
                event: event.name(),
            }),
        }
    }
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct SessionInner {
    username: String,
    state: SessionState,
}

/// Point-in-time copy of a session's mutable fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub connection: ConnectionId,
    pub username: String,
    pub state: SessionState,
}

/// Server-side state for one client connection
#[derive(Debug)]
pub struct Session {
    connection_id: ConnectionId,
    connection: Arc<dyn Connection>,
    opened_at: Timestamp,
    inner: RwLock<SessionInner>,
}

impl Session {
    /// Create a session in `Connecting` for a freshly accepted connection
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection_id: connection.id(),
            connection,
            opened_at: Timestamp::now(),
            inner: RwLock::new(SessionInner {
                username: String::new(),
                state: SessionState::Connecting,
            }),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn opened_at(&self) -> Timestamp {
        self.opened_at
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    pub async fn username(&self) -> String {
        self.inner.read().await.username.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.read().await;
        SessionSnapshot {
            connection: self.connection_id,
            username: inner.username.clone(),
            state: inner.state,
        }
    }

    /// `Connecting -> Connected` with the given username
    pub async fn connect(&self, username: &str) -> Result<(), SessionError> {
        let mut inner = self.inner.write().await;
        inner.state = self.advance(inner.state, SessionEvent::Connect)?;
        inner.username = username.to_string();
        debug!(connection = %self.connection_id, username, "Session connected");
        Ok(())
    }

    /// Rename a connected session, returning the previous username
    pub async fn rename(&self, new_name: &str) -> Result<String, SessionError> {
        let mut inner = self.inner.write().await;
        inner.state = self.advance(inner.state, SessionEvent::Rename)?;
        let previous = std::mem::replace(&mut inner.username, new_name.to_string());
        debug!(connection = %self.connection_id, from = %previous, to = new_name, "Session renamed");
        Ok(previous)
    }

    /// Move to `Disconnected`
    ///
    /// Returns the snapshot taken just before closing when this call performed
    /// the transition, and `None` when the session was already closed.
    pub async fn close(&self) -> Option<SessionSnapshot> {
        let mut inner = self.inner.write().await;
        if inner.state.is_terminal() {
            trace!(connection = %self.connection_id, "Session already disconnected");
            return None;
        }
        let before = SessionSnapshot {
            connection: self.connection_id,
            username: inner.username.clone(),
            state: inner.state,
        };
        inner.state = SessionState::Disconnected;
        debug!(connection = %self.connection_id, from = before.state.state_name(), "Session disconnected");
        Some(before)
    }

    /// Write one server message to this session's connection
    pub fn send(&self, message: &ServerMessage) -> Result<(), TransportError> {
        self.connection.write(&message.encode())
    }

    fn advance(&self, state: SessionState, event: SessionEvent) -> Result<SessionState, SessionError> {
        state
            .transition(event)
            .map_err(|source| SessionError::Transition {
                connection: self.connection_id,
                source,
            })
    }
}
