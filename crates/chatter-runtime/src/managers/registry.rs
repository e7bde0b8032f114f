//! Session registry for the Chatter2 runtime
//!
//! Maps connection identities to sessions. The map sits behind a single
//! `RwLock`; fan-out works on a snapshot of the sessions taken under the read
//! lock, so writes to recipients never happen while the registry is locked.

use std::collections::BTreeMap;
use std::sync::Arc;

use chatter_core::{Connection, ConnectionId, ServerMessage, Session, SessionState};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

// ----------------------------------------------------------------------------
// Reports
// ----------------------------------------------------------------------------

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Number of registered sessions in each state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateDistribution {
    pub connecting: usize,
    pub connected: usize,
    pub disconnected: usize,
}

impl StateDistribution {
    pub fn total(&self) -> usize {
        self.connecting + self.connected + self.disconnected
    }
}

// ----------------------------------------------------------------------------
// Session Registry
// ----------------------------------------------------------------------------

/// Live sessions keyed by connection identity
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<BTreeMap<ConnectionId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `Connecting` session for `connection`
    ///
    /// A connection that is already registered keeps its existing session.
    pub async fn register(&self, connection: Arc<dyn Connection>) -> Arc<Session> {
        let id = connection.id();
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&id) {
            warn!(connection = %id, "Connection registered twice; keeping existing session");
            return Arc::clone(existing);
        }
        let session = Arc::new(Session::new(connection));
        sessions.insert(id, Arc::clone(&session));
        debug!(connection = %id, total = sessions.len(), "Session registered");
        session
    }

    pub async fn lookup(&self, id: ConnectionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: ConnectionId) -> Option<Arc<Session>> {
        let removed = self.sessions.write().await.remove(&id);
        if removed.is_some() {
            debug!(connection = %id, "Session removed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Usernames of `Connected` sessions in registry order
    pub async fn active_usernames(&self) -> Vec<String> {
        let mut usernames = Vec::new();
        for session in self.snapshot().await {
            let snapshot = session.snapshot().await;
            if snapshot.state.is_connected() {
                usernames.push(snapshot.username);
            }
        }
        usernames
    }

    /// Deliver `message` to every `Connected` session except `exclude`
    ///
    /// Each write is independent: a failing recipient is logged and counted
    /// without affecting the others.
    pub async fn broadcast(
        &self,
        exclude: Option<ConnectionId>,
        message: &ServerMessage,
    ) -> BroadcastReport {
        let line = message.encode();
        let mut report = BroadcastReport::default();

        for session in self.snapshot().await {
            if Some(session.connection_id()) == exclude {
                continue;
            }
            if !session.state().await.is_connected() {
                continue;
            }
            match session.connection().write(&line) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(connection = %session.connection_id(), error = %e, "Broadcast write failed");
                }
            }
        }

        debug!(
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast complete"
        );
        report
    }

    /// Deliver `message` to every `Connected` session
    pub async fn broadcast_all(&self, message: &ServerMessage) -> BroadcastReport {
        self.broadcast(None, message).await
    }

    /// Get count of sessions in each state
    pub async fn state_counts(&self) -> StateDistribution {
        let mut distribution = StateDistribution::default();
        for session in self.snapshot().await {
            match session.state().await {
                SessionState::Connecting => distribution.connecting += 1,
                SessionState::Connected => distribution.connected += 1,
                SessionState::Disconnected => distribution.disconnected += 1,
            }
        }
        distribution
    }

    async fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatter_core::protocol::Notification;
    use chatter_harness::{MockBehavior, MockConnection};

    async fn connected(registry: &SessionRegistry, name: &str) -> (Arc<MockConnection>, Arc<Session>) {
        let connection = MockConnection::new();
        let session = registry.register(connection.clone()).await;
        session.connect(name).await.unwrap();
        (connection, session)
    }

    #[tokio::test]
    async fn test_register_lookup_remove() {
        let registry = SessionRegistry::new();
        let connection = MockConnection::new();
        let session = registry.register(connection.clone()).await;

        assert_eq!(session.state().await, SessionState::Connecting);
        assert_eq!(registry.len().await, 1);

        let again = registry.register(connection.clone()).await;
        assert!(Arc::ptr_eq(&session, &again));
        assert_eq!(registry.len().await, 1);

        let found = registry.lookup(connection.id()).await.unwrap();
        assert!(Arc::ptr_eq(&session, &found));

        assert!(registry.remove(connection.id()).await.is_some());
        assert!(registry.lookup(connection.id()).await.is_none());
        assert!(registry.remove(connection.id()).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_active_usernames_only_lists_connected() {
        let registry = SessionRegistry::new();
        let _alice = connected(&registry, "Alice").await;
        let _pending = registry.register(MockConnection::new()).await;
        let (_bob_conn, bob) = connected(&registry, "Bob").await;

        assert_eq!(registry.active_usernames().await, vec!["Alice", "Bob"]);

        bob.close().await;
        assert_eq!(registry.active_usernames().await, vec!["Alice"]);

        let counts = registry.state_counts().await;
        assert_eq!(counts.connected, 1);
        assert_eq!(counts.connecting, 1);
        assert_eq!(counts.disconnected, 1);
        assert_eq!(counts.total(), 3);
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender_and_pending_sessions() {
        let registry = SessionRegistry::new();
        let (alice_conn, alice) = connected(&registry, "Alice").await;
        let (bob_conn, _bob) = connected(&registry, "Bob").await;
        let pending_conn = MockConnection::new();
        registry.register(pending_conn.clone()).await;

        let message = ServerMessage::Update(Notification::NewUser {
            username: "Alice".to_string(),
        });
        let report = registry.broadcast(Some(alice.connection_id()), &message).await;

        assert_eq!(report, BroadcastReport { delivered: 1, failed: 0 });
        assert!(alice_conn.lines().is_empty());
        assert!(pending_conn.lines().is_empty());
        assert_eq!(bob_conn.lines(), vec!["c2/UPDATE NEW_USER Alice"]);
    }

    #[tokio::test]
    async fn test_broadcast_isolates_failing_recipient() {
        let registry = SessionRegistry::new();
        let (first, _) = connected(&registry, "First").await;
        let (broken, _) = connected(&registry, "Broken").await;
        let (last, _) = connected(&registry, "Last").await;
        broken.set_behavior(MockBehavior::FailWrites);

        let report = registry
            .broadcast_all(&ServerMessage::Update(Notification::ServerShutdown))
            .await;

        assert_eq!(report, BroadcastReport { delivered: 2, failed: 1 });
        assert_eq!(first.lines(), vec!["c2/UPDATE SERVER_SHUTDOWN"]);
        assert_eq!(last.lines(), vec!["c2/UPDATE SERVER_SHUTDOWN"]);
    }
}
