//! SQLite-backed message and credential store.
//!
//! Two tables: `users` for credential records and `messages` as the
//! append-only log. The connection sits behind one mutex; every
//! statement is short and persistence failures are the caller's to log.

use parley_core::{Store, StoreError, StoredMessage};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// SQLite store for messages and user credentials.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema
    /// cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(db_err)?;
        Self::create_tables(&conn)?;
        info!(path = %path.display(), "database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database. Used in tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn create_tables(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                from_username TEXT,
                to_username TEXT,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );",
        )
        .map_err(db_err)
    }

    /// The stored password hash for `username`, if the user exists.
    ///
    /// # Errors
    ///
    /// Returns an error on a query failure, distinct from `Ok(None)`
    /// which means the user is unknown.
    pub fn password_hash(&self, username: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT password_hash FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)
    }

    /// Create a credential record.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (including a duplicate
    /// username).
    pub fn save_user(&self, username: &str, password_hash: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, password_hash],
        )
        .map_err(db_err)?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn append(&self, row: &StoredMessage) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO messages (from_username, to_username, content, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![row.from, row.to, row.content, row.timestamp],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<StoredMessage>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT from_username, to_username, content, timestamp
                 FROM messages ORDER BY id DESC LIMIT ?1",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(StoredMessage {
                    from: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    to: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    content: row.get(2)?,
                    timestamp: row.get(3)?,
                })
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(content: &str, ts: &str) -> StoredMessage {
        StoredMessage {
            from: "alice".to_string(),
            to: String::new(),
            content: content.to_string(),
            timestamp: ts.to_string(),
        }
    }

    #[test]
    fn test_append_and_recent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.append(&row("first", "2026-01-02 03:04:05")).unwrap();
        store.append(&row("second", "2026-01-02 03:04:06")).unwrap();
        store.append(&row("third", "2026-01-02 03:04:07")).unwrap();

        let recent = store.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        // Newest first.
        assert_eq!(recent[0].content, "third");
        assert_eq!(recent[1].content, "second");
        assert_eq!(recent[0].from, "alice");
    }

    #[test]
    fn test_recent_empty() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.recent(10).unwrap().is_empty());
    }

    #[test]
    fn test_users() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.password_hash("alice").unwrap(), None);

        store.save_user("alice", "hash-1").unwrap();
        assert_eq!(
            store.password_hash("alice").unwrap(),
            Some("hash-1".to_string())
        );

        // Duplicate registration fails.
        assert!(store.save_user("alice", "hash-2").is_err());
    }
}
