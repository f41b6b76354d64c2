//! Bounded recent-message history.
//!
//! In-memory ring of the most recent rendered lines, write-through to a
//! [`Store`] for durability and cold-start population. The in-memory view
//! is the source of truth for "recent"; store failures degrade to logs.

use crate::message::Message;
use crate::store::{Store, StoreError, StoredMessage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Bounded, persisted message history.
pub struct History {
    entries: Mutex<VecDeque<String>>,
    capacity: usize,
    store: Arc<dyn Store>,
}

impl History {
    /// Create a history of at most `capacity` entries, populated from the
    /// store's most recent rows in chronological order.
    ///
    /// A store failure at load time yields an empty history, not an error.
    #[must_use]
    pub fn new(capacity: usize, store: Arc<dyn Store>) -> Self {
        let entries = match Self::load(capacity, store.as_ref()) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "failed to load history from store, starting empty");
                VecDeque::with_capacity(capacity)
            }
        };
        Self {
            entries: Mutex::new(entries),
            capacity,
            store,
        }
    }

    fn load(capacity: usize, store: &dyn Store) -> Result<VecDeque<String>, StoreError> {
        let rows = store.recent(capacity)?;
        // Rows arrive newest first; persisted rows are replayed with their
        // timestamp prefixed, unlike live lines.
        let mut entries = VecDeque::with_capacity(capacity);
        for row in rows {
            entries.push_front(format!("[{}] {}", row.timestamp, row.content));
        }
        Ok(entries)
    }

    /// Append one rendered line, evicting the oldest at capacity, then
    /// persist it. A persistence failure never rolls back the ring.
    pub fn add(&self, rendered: &str, from: &str, to: &str, timestamp: &str) {
        {
            let mut entries = self.entries.lock().unwrap();
            if entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(rendered.to_string());
        }

        let row = StoredMessage {
            from: from.to_string(),
            to: to.to_string(),
            content: rendered.to_string(),
            timestamp: timestamp.to_string(),
        };
        if let Err(e) = self.store.append(&row) {
            warn!(error = %e, "failed to persist message");
        }
    }

    /// Record a [`Message`], mapping absent sender/target to empty row
    /// fields.
    pub fn record(&self, msg: &Message, timestamp: &str) {
        self.add(
            msg.rendered(),
            msg.from().unwrap_or(""),
            msg.target().unwrap_or(""),
            timestamp,
        );
    }

    /// Chronological snapshot copy, oldest first.
    ///
    /// The snapshot does not reflect later `add` calls.
    #[must_use]
    pub fn get_all(&self) -> Vec<String> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
