//! The live session registry.
//!
//! Maps each username to its connection. One exclusive lock guards the
//! map so registration uniqueness and fan-out snapshots are atomic; no
//! network I/O ever happens under the lock.

use crate::connection::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Another session already holds this username.
    #[error("username already taken: {0}")]
    UsernameTaken(String),
}

/// The mapping of username to active connection.
///
/// A username appears at most once; a second registration is rejected
/// while the first session is live.
#[derive(Default)]
pub struct Registry {
    sessions: Mutex<HashMap<String, Arc<dyn Connection>>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under `username`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UsernameTaken`] if the name is in use.
    pub fn register(
        &self,
        username: impl Into<String>,
        conn: Arc<dyn Connection>,
    ) -> Result<(), RegistryError> {
        let username = username.into();
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(&username) {
            return Err(RegistryError::UsernameTaken(username));
        }
        sessions.insert(username.clone(), conn);
        drop(sessions);
        debug!(user = %username, "session registered");
        Ok(())
    }

    /// Remove a session. Idempotent; returns the connection if present.
    pub fn deregister(&self, username: &str) -> Option<Arc<dyn Connection>> {
        let removed = self.sessions.lock().unwrap().remove(username);
        if removed.is_some() {
            debug!(user = %username, "session deregistered");
        }
        removed
    }

    /// Consistent snapshot of all sessions, taken under the lock.
    ///
    /// Fan-out iterates this snapshot so one message always sees one
    /// membership.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, Arc<dyn Connection>)> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .map(|(name, conn)| (name.clone(), Arc::clone(conn)))
            .collect()
    }

    /// Current usernames, unordered.
    #[must_use]
    pub fn usernames(&self) -> Vec<String> {
        self.sessions.lock().unwrap().keys().cloned().collect()
    }

    /// Whether `username` is currently registered.
    #[must_use]
    pub fn contains(&self, username: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(username)
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().unwrap().is_empty()
    }

    /// Remove and return every session. Used on shutdown to close all
    /// transports outside the lock.
    pub fn drain(&self) -> Vec<(String, Arc<dyn Connection>)> {
        self.sessions.lock().unwrap().drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionError;
    use async_trait::async_trait;

    struct NullConnection;

    #[async_trait]
    impl Connection for NullConnection {
        async fn send_line(&self, _line: &str) -> Result<(), ConnectionError> {
            Ok(())
        }
        async fn close(&self) {}
    }

    fn conn() -> Arc<dyn Connection> {
        Arc::new(NullConnection)
    }

    #[test]
    fn test_register_unique() {
        let registry = Registry::new();
        registry.register("alice", conn()).unwrap();
        assert!(matches!(
            registry.register("alice", conn()),
            Err(RegistryError::UsernameTaken(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_deregister_idempotent() {
        let registry = Registry::new();
        registry.register("alice", conn()).unwrap();
        assert!(registry.deregister("alice").is_some());
        assert!(registry.deregister("alice").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregister_after_deregister() {
        let registry = Registry::new();
        registry.register("alice", conn()).unwrap();
        registry.deregister("alice");
        assert!(registry.register("alice", conn()).is_ok());
    }

    #[test]
    fn test_snapshot_and_usernames() {
        let registry = Registry::new();
        registry.register("alice", conn()).unwrap();
        registry.register("bob", conn()).unwrap();

        let mut names = registry.usernames();
        names.sort();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(registry.snapshot().len(), 2);
        assert!(registry.contains("bob"));
        assert!(!registry.contains("carol"));
    }

    #[test]
    fn test_drain() {
        let registry = Registry::new();
        registry.register("alice", conn()).unwrap();
        registry.register("bob", conn()).unwrap();

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
    }
}
