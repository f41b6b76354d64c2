//! Credential verification over the SQLite store.
//!
//! An unknown username is registered on first use with the offered
//! secret. A store failure rejects the attempt; it is never treated as
//! "user not found".

use crate::store::SqliteStore;
use async_trait::async_trait;
use bcrypt::DEFAULT_COST;
use parley_core::{AuthError, Authenticator, StoreError};
use std::sync::Arc;
use tracing::{info, warn};

fn bcrypt_err(e: bcrypt::BcryptError) -> AuthError {
    AuthError::Backend(StoreError::Database(format!("bcrypt: {e}")))
}

/// bcrypt-based authenticator backed by the SQLite credential table.
pub struct BcryptAuthenticator {
    store: Arc<SqliteStore>,
}

impl BcryptAuthenticator {
    /// Create an authenticator over `store`.
    #[must_use]
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Authenticator for BcryptAuthenticator {
    async fn authenticate(&self, username: &str, secret: &str) -> Result<(), AuthError> {
        let store = Arc::clone(&self.store);
        let username = username.to_string();
        let secret = secret.to_string();

        // bcrypt is deliberately slow; keep it off the async workers.
        let result = tokio::task::spawn_blocking(move || -> Result<(), AuthError> {
            match store.password_hash(&username)? {
                Some(hash) => {
                    if bcrypt::verify(&secret, &hash).map_err(bcrypt_err)? {
                        Ok(())
                    } else {
                        warn!(user = %username, "authentication rejected");
                        Err(AuthError::InvalidCredentials)
                    }
                }
                None => {
                    let hash = bcrypt::hash(&secret, DEFAULT_COST).map_err(bcrypt_err)?;
                    store.save_user(&username, &hash)?;
                    info!(user = %username, "registered new user");
                    Ok(())
                }
            }
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(e) => Err(AuthError::Backend(StoreError::Database(format!(
                "auth task failed: {e}"
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> BcryptAuthenticator {
        BcryptAuthenticator::new(Arc::new(SqliteStore::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_first_use_registers() {
        let auth = authenticator();
        auth.authenticate("alice", "hunter2").await.unwrap();
        // Same secret verifies afterwards.
        auth.authenticate("alice", "hunter2").await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let auth = authenticator();
        auth.authenticate("alice", "hunter2").await.unwrap();
        assert!(matches!(
            auth.authenticate("alice", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let auth = authenticator();
        auth.authenticate("alice", "hunter2").await.unwrap();
        auth.authenticate("bob", "swordfish").await.unwrap();
        assert!(matches!(
            auth.authenticate("bob", "hunter2").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
