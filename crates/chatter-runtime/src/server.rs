//! Chat server facade
//!
//! `ChatServer` owns the registry, the message log and the dispatcher, and
//! exposes the three transport hooks: `on_connect`, `on_line` and `on_close`.
//! Any transport that can hand over whole lines and implement `Connection`
//! can drive it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chatter_core::{
    protocol::{decode, Notification},
    CloseReason, Command, Connection, ConnectionId,
    MessageEntry, MessageId, MessageLog, MessageLogStats, ServerConfig, ServerIdentity,
    ServerMessage, Session, SessionSnapshot,
};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::heartbeat::{HeartbeatHandle, HeartbeatTask};
use crate::logic::{DispatchOutcome, Dispatcher};
use crate::managers::{BroadcastReport, SessionRegistry, StateDistribution};

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Counters {
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    lines_received: AtomicU64,
    lines_malformed: AtomicU64,
    commands_rejected: AtomicU64,
}

/// Point-in-time view of server activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStats {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub lines_received: u64,
    pub lines_malformed: u64,
    pub commands_rejected: u64,
    pub sessions: StateDistribution,
    pub messages: MessageLogStats,
    /// Entries currently held by the message log
    pub messages_stored: usize,
}

// ----------------------------------------------------------------------------
// Chat Server
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub struct ChatServer {
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
    log: Arc<RwLock<MessageLog>>,
    dispatcher: Dispatcher,
    heartbeats: Mutex<HashMap<ConnectionId, HeartbeatHandle>>,
    counters: Counters,
}

impl ChatServer {
    /// Build a server from a validated configuration
    pub fn new(config: ServerConfig) -> chatter_core::Result<Self> {
        config.validate()?;

        let registry = Arc::new(SessionRegistry::new());
        let log = Arc::new(RwLock::new(MessageLog::new()));
        let dispatcher = Dispatcher::new(config.identity(), Arc::clone(&registry), Arc::clone(&log))
            .with_edit_policy(config.edit_policy)
            .with_connection_announcements(config.announce_connections);

        Ok(Self {
            config,
            registry,
            log,
            dispatcher,
            heartbeats: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn identity(&self) -> &ServerIdentity {
        self.dispatcher.identity()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    // ------------------------------------------------------------------------
    // Transport Hooks
    // ------------------------------------------------------------------------

    /// Register a freshly opened connection and start its heartbeat
    pub async fn on_connect(&self, connection: Arc<dyn Connection>) -> Arc<Session> {
        let session = self.registry.register(Arc::clone(&connection)).await;
        self.counters.connections_opened.fetch_add(1, Ordering::Relaxed);

        if self.config.heartbeat_enabled {
            let handle = HeartbeatTask::new(
                connection,
                self.identity().id,
                self.config.heartbeat_interval(),
            )
            .spawn();
            self.heartbeats
                .lock()
                .await
                .insert(session.connection_id(), handle);
        }

        debug!(connection = %session.connection_id(), "Connection opened");
        session
    }

    /// Decode and handle one inbound line
    ///
    /// Lines for a closed session and lines without a `c2/` type are dropped.
    pub async fn on_line(&self, session: &Arc<Session>, line: &str) -> DispatchOutcome {
        self.counters.lines_received.fetch_add(1, Ordering::Relaxed);

        if session.state().await.is_terminal() {
            debug!(connection = %session.connection_id(), "Dropping line for closed session");
            return DispatchOutcome::Ignored;
        }

        let raw = match decode(line) {
            Ok(raw) => raw,
            Err(e) => {
                self.counters.lines_malformed.fetch_add(1, Ordering::Relaxed);
                debug!(connection = %session.connection_id(), error = %e, "Dropping malformed line");
                return DispatchOutcome::Ignored;
            }
        };

        self.handle(session, Command::from(&raw)).await
    }

    /// Dispatch an already decoded command
    ///
    /// A `DISCONNECT` runs the full close path before this returns.
    pub async fn handle(&self, session: &Arc<Session>, command: Command) -> DispatchOutcome {
        let outcome = self.dispatcher.handle(session, command).await;
        match outcome {
            DispatchOutcome::Rejected(_) => {
                self.counters.commands_rejected.fetch_add(1, Ordering::Relaxed);
            }
            DispatchOutcome::Disconnect => {
                self.release(session, &CloseReason::requested(), true).await;
            }
            DispatchOutcome::Replied | DispatchOutcome::Ignored => {}
        }
        outcome
    }

    /// Run the close path for `session`; repeated calls are no-ops
    pub async fn on_close(&self, session: &Arc<Session>, reason: CloseReason) -> Option<SessionSnapshot> {
        let closed = self.dispatcher.handle_close(session).await;
        self.release(session, &reason, closed.is_some()).await;
        closed
    }

    /// Stop the heartbeat and account for a close
    async fn release(&self, session: &Arc<Session>, reason: &CloseReason, closed: bool) {
        let id = session.connection_id();
        if let Some(heartbeat) = self.heartbeats.lock().await.remove(&id) {
            heartbeat.abort();
        }
        if !closed {
            return;
        }
        self.counters.connections_closed.fetch_add(1, Ordering::Relaxed);
        let lifetime_ms = session.opened_at().elapsed_millis();
        if reason.was_clean {
            debug!(connection = %id, %reason, lifetime_ms, "Connection closed");
        } else {
            warn!(connection = %id, %reason, lifetime_ms, "Connection closed abnormally");
        }
    }

    // ------------------------------------------------------------------------
    // Server Notices
    // ------------------------------------------------------------------------

    /// Send `UPDATE BROADCAST <text>` to every connected session
    pub async fn announce(&self, text: &str) -> BroadcastReport {
        info!(text, "Broadcasting server notice");
        self.registry
            .broadcast_all(&ServerMessage::Update(Notification::Broadcast {
                text: text.to_string(),
            }))
            .await
    }

    /// Tell every connected session the server is going away and stop heartbeats
    pub async fn shutdown(&self) -> BroadcastReport {
        let report = self
            .registry
            .broadcast_all(&ServerMessage::Update(Notification::ServerShutdown))
            .await;

        let mut heartbeats = self.heartbeats.lock().await;
        for (_, heartbeat) in heartbeats.drain() {
            heartbeat.abort();
        }
        info!(notified = report.delivered, "Server shutting down");
        report
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub async fn last_sent_id(&self) -> Option<MessageId> {
        self.log.read().await.last_sent_id()
    }

    pub async fn message(&self, id: &MessageId) -> Option<Arc<MessageEntry>> {
        self.log.read().await.get(id)
    }

    pub async fn active_usernames(&self) -> Vec<String> {
        self.registry.active_usernames().await
    }

    pub async fn stats(&self) -> ServerStats {
        let sessions = self.registry.state_counts().await;
        let (messages, messages_stored) = {
            let log = self.log.read().await;
            (log.stats().clone(), log.len())
        };
        ServerStats {
            connections_opened: self.counters.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.counters.connections_closed.load(Ordering::Relaxed),
            lines_received: self.counters.lines_received.load(Ordering::Relaxed),
            lines_malformed: self.counters.lines_malformed.load(Ordering::Relaxed),
            commands_rejected: self.counters.commands_rejected.load(Ordering::Relaxed),
            sessions,
            messages,
            messages_stored,
        }
    }
}
