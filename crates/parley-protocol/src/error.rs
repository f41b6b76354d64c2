//! Protocol error codes.
//!
//! Every variant renders as the exact wire line the client sees,
//! `ERR<NNN>: <description>`.

use thiserror::Error;

/// Errors reported to a client over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Another session already holds this username.
    #[error("ERR001: username already taken")]
    UsernameTaken,

    /// Credentials were rejected.
    #[error("ERR002: authentication failed")]
    AuthFailed,

    /// A command line with no command name.
    #[error("ERR003: invalid command")]
    InvalidCommand,

    /// `/pm` without a target or message body.
    #[error("ERR004: /pm requires username and message")]
    MalformedPrivate,

    /// Unrecognized command name.
    #[error("ERR005: unknown command {0}")]
    UnknownCommand(String),
}

impl ProtocolError {
    /// The bare error code, e.g. `ERR002`.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::UsernameTaken => "ERR001",
            ProtocolError::AuthFailed => "ERR002",
            ProtocolError::InvalidCommand => "ERR003",
            ProtocolError::MalformedPrivate => "ERR004",
            ProtocolError::UnknownCommand(_) => "ERR005",
        }
    }
}
