//! Mock Connection for Testing
//!
//! A deterministic in-memory connection. Lines are recorded in write order;
//! the behaviour can be flipped at runtime to simulate failing or closed
//! links.

use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc, Mutex, MutexGuard,
};
use std::time::Duration;

use chatter_core::{Connection, ConnectionId, TransportError};
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};
use tracing::trace;

// ----------------------------------------------------------------------------
// Behaviour
// ----------------------------------------------------------------------------

/// How a mock connection reacts to writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MockBehavior {
    /// Record every line
    Healthy = 0,
    /// Report the connection open but fail every write as if the buffer were full
    FailWrites = 1,
    /// Report the connection closed and reject writes
    Closed = 2,
}

impl MockBehavior {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => MockBehavior::FailWrites,
            2 => MockBehavior::Closed,
            _ => MockBehavior::Healthy,
        }
    }
}

// ----------------------------------------------------------------------------
// Mock Connection
// ----------------------------------------------------------------------------

/// In-memory connection recording written lines
#[derive(Debug)]
pub struct MockConnection {
    id: ConnectionId,
    behavior: AtomicU8,
    lines: Mutex<Vec<String>>,
    written: Notify,
}

impl MockConnection {
    /// Healthy connection with a fresh id
    pub fn new() -> Arc<Self> {
        Self::with_behavior(MockBehavior::Healthy)
    }

    /// Connection whose writes always fail
    pub fn failing() -> Arc<Self> {
        Self::with_behavior(MockBehavior::FailWrites)
    }

    pub fn with_behavior(behavior: MockBehavior) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::next(),
            behavior: AtomicU8::new(behavior as u8),
            lines: Mutex::new(Vec::new()),
            written: Notify::new(),
        })
    }

    pub fn behavior(&self) -> MockBehavior {
        MockBehavior::from_u8(self.behavior.load(Ordering::SeqCst))
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        self.behavior.store(behavior as u8, Ordering::SeqCst);
    }

    /// All recorded lines in write order
    pub fn lines(&self) -> Vec<String> {
        self.recorded().clone()
    }

    /// Remove and return all recorded lines
    pub fn take_lines(&self) -> Vec<String> {
        std::mem::take(&mut *self.recorded())
    }

    /// Remove and return the most recent line
    pub fn pop_last_line(&self) -> Option<String> {
        self.recorded().pop()
    }

    /// Remove and return the oldest line
    pub fn pop_first_line(&self) -> Option<String> {
        let mut lines = self.recorded();
        if lines.is_empty() {
            None
        } else {
            Some(lines.remove(0))
        }
    }

    pub fn line_count(&self) -> usize {
        self.recorded().len()
    }

    /// Wait until a recorded line satisfies `predicate`, up to `limit`
    pub async fn wait_for_line<F>(&self, limit: Duration, predicate: F) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        let deadline = Instant::now() + limit;
        loop {
            let notified = self.written.notified();
            if let Some(line) = self.recorded().iter().find(|line| predicate(line)) {
                return Some(line.clone());
            }
            if timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    fn recorded(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn write(&self, line: &str) -> Result<(), TransportError> {
        match self.behavior() {
            MockBehavior::Healthy => {
                trace!(connection = %self.id, line, "Mock write");
                self.recorded().push(line.to_string());
                self.written.notify_waiters();
                Ok(())
            }
            MockBehavior::FailWrites => Err(TransportError::BufferFull {
                connection: self.id,
                capacity: 0,
            }),
            MockBehavior::Closed => Err(TransportError::Closed {
                connection: self.id,
            }),
        }
    }

    fn is_open(&self) -> bool {
        self.behavior() != MockBehavior::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_lines_in_order() {
        let connection = MockConnection::new();
        connection.write("c2/ACKNOWLEDGE").unwrap();
        connection.write("c2/PING 0").unwrap();

        assert_eq!(connection.lines(), vec!["c2/ACKNOWLEDGE", "c2/PING 0"]);
        assert_eq!(connection.pop_last_line().as_deref(), Some("c2/PING 0"));
        assert_eq!(connection.pop_first_line().as_deref(), Some("c2/ACKNOWLEDGE"));
        assert_eq!(connection.line_count(), 0);
    }

    #[test]
    fn test_behaviour_switching() {
        let connection = MockConnection::failing();
        assert!(connection.is_open());
        assert!(matches!(
            connection.write("x"),
            Err(TransportError::BufferFull { .. })
        ));

        connection.set_behavior(MockBehavior::Closed);
        assert!(!connection.is_open());
        assert!(matches!(
            connection.write("x"),
            Err(TransportError::Closed { .. })
        ));
        assert!(connection.lines().is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_line() {
        let connection = MockConnection::new();
        let writer = Arc::clone(&connection);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.write("c2/PING 7").unwrap();
        });

        let line = connection
            .wait_for_line(Duration::from_secs(2), |line| line.starts_with("c2/PING"))
            .await;
        assert_eq!(line.as_deref(), Some("c2/PING 7"));

        let missing = connection
            .wait_for_line(Duration::from_millis(20), |line| line == "never")
            .await;
        assert!(missing.is_none());
    }
}
