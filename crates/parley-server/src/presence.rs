//! UDP presence side channel.
//!
//! Every interval, one datagram carries the comma-joined username list
//! to the broadcast address. Presence is advisory: a failed send is
//! logged and superseded by the next snapshot.

use parley_protocol::presence_payload;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{info, trace, warn};

/// Accessor for the current username list.
pub type UsernameSource = Box<dyn Fn() -> Vec<String> + Send + Sync>;

/// Periodic presence publisher.
pub struct PresencePublisher {
    addr: SocketAddr,
    interval: Duration,
    send_timeout: Duration,
    usernames: UsernameSource,
}

impl PresencePublisher {
    /// Create a publisher that reads usernames through `usernames`.
    #[must_use]
    pub fn new(
        addr: SocketAddr,
        interval: Duration,
        send_timeout: Duration,
        usernames: impl Fn() -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            addr,
            interval,
            send_timeout,
            usernames: Box::new(usernames),
        }
    }

    /// Run the publish loop until the shutdown signal flips.
    ///
    /// # Errors
    ///
    /// Returns an error only if the UDP socket cannot be set up;
    /// individual send failures are logged and the loop continues.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.set_broadcast(true)?;
        info!(addr = %self.addr, "presence publisher started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await; // the first tick fires immediately
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let payload = presence_payload(&(self.usernames)());
                    match timeout(self.send_timeout, socket.send_to(payload.as_bytes(), self.addr)).await {
                        Ok(Ok(_)) => trace!(users = %payload, "presence sent"),
                        Ok(Err(e)) => warn!(error = %e, "presence send failed"),
                        Err(_) => warn!("presence send timed out"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("presence publisher stopping");
                    return Ok(());
                }
            }
        }
    }
}
