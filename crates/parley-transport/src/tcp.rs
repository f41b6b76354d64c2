//! TCP line transport.
//!
//! Every read and write is bounded by an idle deadline, reset per
//! operation; a stalled peer fails the operation instead of blocking its
//! caller indefinitely.

use async_trait::async_trait;
use parley_core::{Connection, ConnectionError};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

/// Split a stream into its write-side connection handle and its
/// read-side line reader, both bounded by `idle_timeout`.
#[must_use]
pub fn split(stream: TcpStream, idle_timeout: Duration) -> (Arc<TcpLineConnection>, LineReader) {
    let peer_addr = stream.peer_addr().ok();
    let (read_half, write_half) = stream.into_split();
    let conn = Arc::new(TcpLineConnection {
        writer: Mutex::new(write_half),
        peer_addr,
        open: AtomicBool::new(true),
        idle_timeout,
    });
    let reader = LineReader {
        reader: BufReader::new(read_half),
        idle_timeout,
        buf: String::new(),
    };
    (conn, reader)
}

/// The write side of one TCP connection.
///
/// Shared between the router's fan-out workers, the heartbeat loop, and
/// direct command replies; an internal lock serializes writers so lines
/// never interleave.
pub struct TcpLineConnection {
    writer: Mutex<OwnedWriteHalf>,
    peer_addr: Option<SocketAddr>,
    open: AtomicBool,
    idle_timeout: Duration,
}

#[async_trait]
impl Connection for TcpLineConnection {
    async fn send_line(&self, line: &str) -> Result<(), ConnectionError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(ConnectionError::Closed);
        }

        let mut writer = self.writer.lock().await;
        let write = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        };
        match timeout(self.idle_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Io(e)),
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            // FIN the write direction; errors on an already-dead socket
            // are irrelevant here.
            let _ = self.writer.lock().await.shutdown().await;
            debug!(peer = ?self.peer_addr, "connection closed");
        }
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }
}

/// The read side of one TCP connection, owned by the session read loop.
pub struct LineReader {
    reader: BufReader<OwnedReadHalf>,
    idle_timeout: Duration,
    buf: String,
}

impl LineReader {
    /// Read one line, bounded by the idle deadline.
    ///
    /// Returns `Ok(None)` on a clean EOF. The trailing newline is
    /// stripped; the line is not otherwise trimmed.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::Timeout`] if no line arrives within the
    /// deadline, [`ConnectionError::Io`] on a transport error.
    pub async fn read_line(&mut self) -> Result<Option<String>, ConnectionError> {
        self.buf.clear();
        match timeout(self.idle_timeout, self.reader.read_line(&mut self.buf)).await {
            Ok(Ok(0)) => Ok(None),
            Ok(Ok(_)) => {
                let line = self.buf.trim_end_matches(['\r', '\n']).to_string();
                Ok(Some(line))
            }
            Ok(Err(e)) => Err(ConnectionError::Io(e)),
            Err(_) => Err(ConnectionError::Timeout),
        }
    }
}
