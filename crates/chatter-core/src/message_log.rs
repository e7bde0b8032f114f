//! Keyed Message Log
//!
//! Stores every chat message the server accepted, keyed by a server-assigned
//! id. The log is append-only except for message content, which may be
//! replaced by an edit. Entries are copy-on-write: an edit swaps in a new
//! [`MessageEntry`] sharing the original id, sender and timestamp, so readers
//! holding the old `Arc` never observe a half-applied change.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::errors::MessageLogError;
use crate::types::{MessageId, Timestamp};

// ----------------------------------------------------------------------------
// Message Entry
// ----------------------------------------------------------------------------

/// One logged chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntry {
    id: MessageId,
    sender: String,
    timestamp: Timestamp,
    content: String,
}

impl MessageEntry {
    fn new(id: MessageId, sender: String, timestamp: Timestamp, content: String) -> Self {
        Self {
            id,
            sender,
            timestamp,
            content,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Username of the sender at the time the message was sent
    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Copy of this entry with new content; identity fields carried over
    fn with_content(&self, content: String) -> Self {
        Self {
            id: self.id,
            sender: self.sender.clone(),
            timestamp: self.timestamp,
            content,
        }
    }
}

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Message log counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLogStats {
    pub appended: u64,
    pub updated: u64,
    pub update_misses: u64,
}

// ----------------------------------------------------------------------------
// Message Log
// ----------------------------------------------------------------------------

/// Keyed store of sent messages
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: HashMap<MessageId, Arc<MessageEntry>>,
    order: Vec<MessageId>,
    last_sent_id: Option<MessageId>,
    stats: MessageLogStats,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new message under a fresh id and return the id
    pub fn append(&mut self, sender: &str, timestamp: Timestamp, content: &str) -> MessageId {
        let mut id = MessageId::generate();
        while self.entries.contains_key(&id) {
            id = MessageId::generate();
        }

        let entry = MessageEntry::new(id, sender.to_string(), timestamp, content.to_string());
        self.entries.insert(id, Arc::new(entry));
        self.order.push(id);
        self.last_sent_id = Some(id);
        self.stats.appended += 1;

        trace!(%id, sender, "Message appended");
        id
    }

    /// Replace the content of an existing message
    ///
    /// Requester identity is not checked here; that policy belongs to the
    /// caller. A miss leaves the log untouched.
    pub fn update(
        &mut self,
        id: &MessageId,
        content: &str,
    ) -> Result<Arc<MessageEntry>, MessageLogError> {
        let Some(slot) = self.entries.get_mut(id) else {
            self.stats.update_misses += 1;
            return Err(MessageLogError::NotFound { id: *id });
        };

        let updated = Arc::new(slot.with_content(content.to_string()));
        *slot = Arc::clone(&updated);
        self.stats.updated += 1;

        trace!(%id, "Message content updated");
        Ok(updated)
    }

    pub fn get(&self, id: &MessageId) -> Option<Arc<MessageEntry>> {
        self.entries.get(id).cloned()
    }

    /// Id of the most recently appended message
    pub fn last_sent_id(&self) -> Option<MessageId> {
        self.last_sent_id
    }

    /// All entries in append order
    pub fn entries(&self) -> Vec<Arc<MessageEntry>> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &MessageLogStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_fresh_ids() {
        let mut log = MessageLog::new();
        assert!(log.last_sent_id().is_none());

        let first = log.append("Alice", Timestamp::new(1), "hello");
        let second = log.append("Bob", Timestamp::new(2), "hi");

        assert_ne!(first, second);
        assert_eq!(log.last_sent_id(), Some(second));
        assert_eq!(log.len(), 2);
        assert_eq!(log.stats().appended, 2);

        let order: Vec<MessageId> = log.entries().iter().map(|e| e.id()).collect();
        assert_eq!(order, vec![first, second]);
    }

    #[test]
    fn test_update_replaces_only_content() {
        let mut log = MessageLog::new();
        let id = log.append("Dummy", Timestamp::new(1_700_000_000_000), "Test message");
        let before = log.get(&id).unwrap();

        let updated = log.update(&id, "New message value").unwrap();

        assert_eq!(updated.content(), "New message value");
        assert_eq!(updated.id(), id);
        assert_eq!(updated.sender(), "Dummy");
        assert_eq!(updated.timestamp(), Timestamp::new(1_700_000_000_000));
        // Readers holding the old entry keep the old content
        assert_eq!(before.content(), "Test message");
        assert_eq!(log.get(&id).unwrap().content(), "New message value");
        assert_eq!(log.last_sent_id(), Some(id));
    }

    #[test]
    fn test_update_missing_id() {
        let mut log = MessageLog::new();
        let id = log.append("Dummy", Timestamp::new(1), "kept");
        let missing = MessageId::generate();

        let result = log.update(&missing, "ghost");
        assert_eq!(result.unwrap_err(), MessageLogError::NotFound { id: missing });
        assert_eq!(log.len(), 1);
        assert_eq!(log.get(&id).unwrap().content(), "kept");
        assert_eq!(log.stats().update_misses, 1);
        assert_eq!(log.stats().updated, 0);
    }
}
