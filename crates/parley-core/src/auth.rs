//! Authentication capability.
//!
//! The core only sees accept / reject / backend failure. Credential
//! storage and hashing live behind this trait in the server crate.

use crate::store::StoreError;
use async_trait::async_trait;
use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The secret did not match the stored credential.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The credential backend failed. Distinct from "user not found":
    /// a lookup failure rejects the attempt, it never registers.
    #[error("credential backend failure: {0}")]
    Backend(#[from] StoreError),
}

/// Verifies or provisions a `(username, secret)` pair.
///
/// An unknown username is registered on first use with the offered
/// secret and accepted.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Verify `secret` for `username`, registering first-seen users.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] on a bad secret,
    /// [`AuthError::Backend`] when the credential store fails.
    async fn authenticate(&self, username: &str, secret: &str) -> Result<(), AuthError>;
}
