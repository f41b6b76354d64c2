//! Client side of the chat session.
//!
//! The handshake is two lines (username, secret); afterwards the receive
//! loop answers every `PING` probe with `PONG` and hands any other line
//! to the caller. Outbound chat goes through the shared connection
//! handle, so probe replies and user messages never interleave.

use parley_core::{Connection, ConnectionError};
use parley_protocol::{PING, PONG};
use parley_transport::{split, LineReader, TcpLineConnection};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Connect and perform the two-line handshake.
///
/// The returned connection handle is shared between the input loop and
/// the receive loop; the reader is owned by the receive loop alone.
///
/// # Errors
///
/// Returns [`ConnectionError::Io`] if the server is unreachable, or any
/// write error from the handshake lines.
pub async fn connect(
    addr: SocketAddr,
    idle_timeout: Duration,
    username: &str,
    secret: &str,
) -> Result<(Arc<TcpLineConnection>, LineReader), ConnectionError> {
    let stream = TcpStream::connect(addr).await?;
    let (conn, reader) = split(stream, idle_timeout);
    conn.send_line(username).await?;
    conn.send_line(secret).await?;
    info!(addr = %addr, user = %username, "connected");
    Ok((conn, reader))
}

/// Run the receive loop until the server closes the connection.
///
/// `PING` probes are answered with `PONG` and never reach `on_line`;
/// every other line (chat, system announcements, error lines) does.
///
/// # Errors
///
/// Returns the read or probe-reply failure that ended the loop; a clean
/// server close returns `Ok(())`.
pub async fn receive_loop(
    mut reader: LineReader,
    conn: Arc<TcpLineConnection>,
    mut on_line: impl FnMut(&str),
) -> Result<(), ConnectionError> {
    loop {
        match reader.read_line().await? {
            None => {
                info!("server closed the connection");
                return Ok(());
            }
            Some(line) if line.trim() == PING => {
                debug!("probe answered");
                conn.send_line(PONG).await?;
            }
            Some(line) => on_line(&line),
        }
    }
}
