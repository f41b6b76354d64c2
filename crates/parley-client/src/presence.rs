//! UDP presence listener.
//!
//! Passively receives the server's presence datagrams; one datagram is
//! one comma-joined username list. A malformed datagram is logged and
//! skipped, never fatal.

use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{info, warn};

/// Listener for presence snapshots.
pub struct PresenceListener {
    socket: UdpSocket,
}

impl PresenceListener {
    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!(addr = %addr, "presence listener started");
        Ok(Self { socket })
    }

    /// The bound local address (useful when binding port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive datagrams forever, handing each username list to
    /// `on_snapshot`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket fails; individual malformed
    /// datagrams are skipped.
    pub async fn run(self, mut on_snapshot: impl FnMut(&str)) -> std::io::Result<()> {
        let mut buf = [0u8; 1024];
        loop {
            let (n, _) = self.socket.recv_from(&mut buf).await?;
            match std::str::from_utf8(&buf[..n]) {
                Ok(users) => on_snapshot(users),
                Err(e) => warn!(error = %e, "malformed presence datagram"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_receives_snapshots() {
        let listener = PresenceListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tokio::spawn(listener.run(move |users| {
            sink.lock().unwrap().push(users.to_string());
        }));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"alice,bob", addr).await.unwrap();

        timeout(Duration::from_secs(2), async {
            loop {
                if !seen.lock().unwrap().is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("no snapshot within deadline");

        assert_eq!(seen.lock().unwrap().clone(), vec!["alice,bob"]);
    }
}
