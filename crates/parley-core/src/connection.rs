//! The delivery seam between the router and a session's transport.
//!
//! A session exclusively owns its transport; the router and heartbeat
//! reach it only through this narrow, deadline-bounded interface.

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a connection write.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The peer closed the connection.
    #[error("connection closed")]
    Closed,

    /// The write did not complete within the idle deadline.
    #[error("write timed out")]
    Timeout,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One client's outbound transport handle.
///
/// Every write is bounded by the connection's idle deadline; a stalled
/// client fails the write rather than blocking the caller.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Write one line (newline appended) to the client.
    async fn send_line(&self, line: &str) -> Result<(), ConnectionError>;

    /// Close the transport. Idempotent.
    async fn close(&self);

    /// Remote peer address, if known.
    fn peer_addr(&self) -> Option<std::net::SocketAddr> {
        None
    }
}
