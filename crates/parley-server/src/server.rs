//! TCP accept loop and shutdown wiring.

use crate::session;
use parley_core::{Authenticator, History, Registry, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Shared server state handed to every session.
pub struct ServerState {
    /// The live session registry.
    pub registry: Arc<Registry>,
    /// The fan-out router.
    pub router: Arc<Router>,
    /// The bounded message history.
    pub history: Arc<History>,
    /// Credential verification.
    pub auth: Arc<dyn Authenticator>,
    /// Idle deadline for every TCP read and write.
    pub tcp_timeout: Duration,
    /// Heartbeat probe interval.
    pub heartbeat_interval: Duration,
}

/// The chat server: owns the listener and the shutdown signal.
pub struct ChatServer {
    state: Arc<ServerState>,
    listener: TcpListener,
    shutdown: watch::Sender<bool>,
}

impl ChatServer {
    /// Bind the TCP listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound; this is
    /// process-fatal at startup.
    pub async fn bind(addr: SocketAddr, state: Arc<ServerState>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %addr, "TCP server listening");
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            state,
            listener,
            shutdown,
        })
    }

    /// The bound local address (useful when binding port 0).
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// A receiver that flips when [`ChatServer::shutdown`] is called.
    #[must_use]
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Run the accept loop until shutdown.
    ///
    /// Each accepted connection gets its own task; a failed accept is
    /// logged and never fatal.
    pub async fn run(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                res = self.listener.accept() => match res {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "connection accepted");
                        tokio::spawn(session::serve(
                            Arc::clone(&self.state),
                            stream,
                            self.shutdown.subscribe(),
                        ));
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                    }
                },
                _ = shutdown.changed() => {
                    info!("accept loop stopping");
                    return;
                }
            }
        }
    }

    /// Graceful shutdown: stop accepting, close every registered
    /// session's transport, and drain the router.
    pub async fn shutdown(&self) {
        info!("shutting down");
        let _ = self.shutdown.send(true);

        for (username, conn) in self.state.registry.drain() {
            conn.close().await;
            debug!(user = %username, "session transport closed");
        }

        self.state.router.shutdown().await;
        info!("server stopped");
    }
}
