//! Durable message storage capability.
//!
//! The store is an append-only log of persisted rows. History treats it
//! as best-effort durability: append failures are logged by the caller
//! and never roll back in-memory state.

use std::sync::Mutex;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database rejected the operation.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One persisted message row.
///
/// `from` and `to` are empty strings for system and broadcast messages
/// respectively; `timestamp` is UTC at second precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Sender username, empty for system messages.
    pub from: String,
    /// Target username, empty unless private.
    pub to: String,
    /// The rendered message line.
    pub content: String,
    /// UTC timestamp, `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
}

/// Append-only message log.
pub trait Store: Send + Sync {
    /// Append one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row could not be persisted.
    fn append(&self, row: &StoredMessage) -> Result<(), StoreError>;

    /// The most recent `limit` rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows could not be read.
    fn recent(&self, limit: usize) -> Result<Vec<StoredMessage>, StoreError>;
}

/// In-process store. Keeps every row in memory; used in tests and for
/// running the server without a database file.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<StoredMessage>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rows ever appended.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Whether the store holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.lock().unwrap().is_empty()
    }
}

impl Store for MemoryStore {
    fn append(&self, row: &StoredMessage) -> Result<(), StoreError> {
        self.rows.lock().unwrap().push(row.clone());
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<StoredMessage>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(content: &str) -> StoredMessage {
        StoredMessage {
            from: "alice".to_string(),
            to: String::new(),
            content: content.to_string(),
            timestamp: "2026-01-02 03:04:05".to_string(),
        }
    }

    #[test]
    fn test_memory_store_recent_newest_first() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.append(&row(&format!("msg-{i}"))).unwrap();
        }

        let recent = store.recent(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "msg-4");
        assert_eq!(recent[2].content, "msg-2");
    }

    #[test]
    fn test_memory_store_recent_under_limit() {
        let store = MemoryStore::new();
        store.append(&row("only")).unwrap();
        assert_eq!(store.recent(10).unwrap().len(), 1);
    }
}
