//! Per-connection session lifecycle.
//!
//! Each accepted connection authenticates, registers, replays history,
//! then runs a read loop and a heartbeat loop until either detects a
//! dead peer. Teardown is idempotent: whichever loop loses the race
//! observes a no-op.

use crate::metrics::{self, ConnectionMetricsGuard};
use crate::server::ServerState;
use parley_core::{AuthError, Connection, ConnectionError, Message};
use parley_protocol::{parse_line, ClientInput, Command, ProtocolError, PING, PONG};
use parley_transport::{split, LineReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Why a session ended. Chooses the departure announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    /// Read failure or clean disconnect.
    Left,
    /// Idle deadline or heartbeat write failure.
    TimedOut,
    /// Server shutdown; no announcement.
    Shutdown,
}

/// Serve one accepted connection to completion.
pub async fn serve(state: Arc<ServerState>, stream: TcpStream, mut shutdown: watch::Receiver<bool>) {
    let _guard = ConnectionMetricsGuard::new();
    let peer = stream.peer_addr().ok();
    let (conn, mut reader) = split(stream, state.tcp_timeout);

    // Handshake: two lines, username then secret.
    let Some(username) = handshake_line(&mut reader).await else {
        debug!(peer = ?peer, "handshake aborted");
        return;
    };
    let Some(secret) = handshake_line(&mut reader).await else {
        debug!(peer = ?peer, user = %username, "handshake aborted");
        return;
    };

    match state.auth.authenticate(&username, &secret).await {
        Ok(()) => {}
        Err(AuthError::InvalidCredentials) => {
            metrics::record_error("auth");
            let _ = conn.send_line(&ProtocolError::AuthFailed.to_string()).await;
            conn.close().await;
            return;
        }
        Err(AuthError::Backend(e)) => {
            // A backend failure rejects; it is never "user not found".
            error!(user = %username, error = %e, "authenticator backend failed");
            metrics::record_error("auth_backend");
            let _ = conn.send_line(&ProtocolError::AuthFailed.to_string()).await;
            conn.close().await;
            return;
        }
    }

    if state.registry.register(&username, conn.clone()).is_err() {
        info!(user = %username, "duplicate session rejected");
        metrics::record_error("duplicate_session");
        let _ = conn
            .send_line(&ProtocolError::UsernameTaken.to_string())
            .await;
        conn.close().await;
        return;
    }
    metrics::record_session_start();
    info!(user = %username, peer = ?peer, "session started");

    let session = Arc::new(Session {
        username,
        conn,
        state,
        torn_down: AtomicBool::new(false),
    });

    // New arrivals see the recent history before live traffic.
    for line in session.state.history.get_all() {
        if session.conn.send_line(&line).await.is_err() {
            break; // the loops below will notice the dead transport
        }
    }

    if session
        .announce(format!("{} joined the chat", session.username))
        .await
        .is_err()
    {
        session.teardown(Departure::Shutdown).await;
        return;
    }

    let heartbeat = tokio::spawn(heartbeat_loop(Arc::clone(&session), shutdown.clone()));

    loop {
        tokio::select! {
            res = reader.read_line() => match res {
                Ok(Some(line)) => {
                    if let Err(departure) = session.handle_line(&line).await {
                        session.teardown(departure).await;
                        break;
                    }
                }
                Ok(None) => {
                    info!(user = %session.username, "client disconnected");
                    session.teardown(Departure::Left).await;
                    break;
                }
                Err(ConnectionError::Timeout) => {
                    info!(user = %session.username, "idle timeout");
                    session.teardown(Departure::TimedOut).await;
                    break;
                }
                Err(e) => {
                    info!(user = %session.username, error = %e, "read failed");
                    session.teardown(Departure::Left).await;
                    break;
                }
            },
            _ = shutdown.changed() => {
                session.teardown(Departure::Shutdown).await;
                break;
            }
        }
    }

    heartbeat.abort();
}

async fn handshake_line(reader: &mut LineReader) -> Option<String> {
    match reader.read_line().await {
        Ok(Some(line)) => Some(line.trim().to_string()),
        Ok(None) | Err(_) => None,
    }
}

/// Server-initiated liveness probe. Failure of the probe write is the
/// disconnect signal; no reply is awaited.
async fn heartbeat_loop(session: Arc<Session>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(session.state.heartbeat_interval);
    ticker.tick().await; // the first tick fires immediately
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = session.conn.send_line(PING).await {
                    info!(user = %session.username, error = %e, "heartbeat write failed");
                    session.teardown(Departure::TimedOut).await;
                    return;
                }
            }
            _ = shutdown.changed() => return,
        }
    }
}

struct Session {
    username: String,
    conn: Arc<dyn Connection>,
    state: Arc<ServerState>,
    torn_down: AtomicBool,
}

impl Session {
    /// Route one client line. An `Err` ends the session.
    async fn handle_line(&self, line: &str) -> Result<(), Departure> {
        if line.trim() == PONG {
            // Heartbeat is unidirectional; replies carry no information.
            return Ok(());
        }

        let input = match parse_line(line) {
            Ok(Some(input)) => input,
            Ok(None) => return Ok(()),
            Err(e) => {
                // Reported to the issuing client only, never broadcast.
                metrics::record_error("protocol");
                let _ = self.conn.send_line(&e.to_string()).await;
                return Ok(());
            }
        };

        match input {
            ClientInput::Chat(text) => {
                metrics::record_message("broadcast");
                self.enqueue(Message::broadcast(self.username.as_str(), text))
                    .await
            }
            ClientInput::Command(Command::Private { target, body }) => {
                metrics::record_message("private");
                self.enqueue(Message::private(self.username.as_str(), target, body))
                    .await
            }
            ClientInput::Command(Command::History) => {
                for entry in self.state.history.get_all() {
                    if self.conn.send_line(&entry).await.is_err() {
                        return Err(Departure::Left);
                    }
                }
                Ok(())
            }
            ClientInput::Command(Command::Users) => {
                let mut names = self.state.registry.usernames();
                names.sort();
                let reply = format!("Online users: {}", names.join(", "));
                self.conn
                    .send_line(&reply)
                    .await
                    .map_err(|_| Departure::Left)
            }
        }
    }

    async fn enqueue(&self, msg: Message) -> Result<(), Departure> {
        self.state
            .router
            .enqueue(msg)
            .await
            .map_err(|_| Departure::Shutdown)
    }

    async fn announce(&self, text: String) -> Result<(), Departure> {
        metrics::record_message("system");
        self.enqueue(Message::system(text)).await
    }

    /// First caller wins; the second loop observes a no-op.
    async fn teardown(&self, departure: Departure) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.registry.deregister(&self.username);
        self.conn.close().await;
        metrics::record_session_end();

        let text = match departure {
            Departure::Left => Some(format!("{} left the chat", self.username)),
            Departure::TimedOut => Some(format!("{} left the chat (timeout)", self.username)),
            Departure::Shutdown => None,
        };
        if let Some(text) = text {
            metrics::record_message("system");
            if let Err(e) = self.state.router.enqueue(Message::system(text)).await {
                warn!(user = %self.username, error = %e, "could not announce departure");
            }
        }
        debug!(user = %self.username, ?departure, "session ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_core::{Authenticator, History, MemoryStore, Registry, Router, RouterConfig};
    use std::time::Duration;

    struct AcceptAll;

    #[async_trait]
    impl Authenticator for AcceptAll {
        async fn authenticate(&self, _username: &str, _secret: &str) -> Result<(), AuthError> {
            Ok(())
        }
    }

    /// Fails every write, as a dead peer's transport would.
    struct DeadConnection;

    #[async_trait]
    impl Connection for DeadConnection {
        async fn send_line(&self, _line: &str) -> Result<(), ConnectionError> {
            Err(ConnectionError::Closed)
        }
        async fn close(&self) {}
    }

    fn state(heartbeat_interval: Duration) -> Arc<ServerState> {
        let registry = Arc::new(Registry::new());
        let history = Arc::new(History::new(100, Arc::new(MemoryStore::new())));
        let router = Arc::new(Router::start(
            RouterConfig::default(),
            Arc::clone(&registry),
            Arc::clone(&history),
        ));
        Arc::new(ServerState {
            registry,
            router,
            history,
            auth: Arc::new(AcceptAll),
            tcp_timeout: Duration::from_secs(5),
            heartbeat_interval,
        })
    }

    #[tokio::test]
    async fn test_heartbeat_write_failure_tears_down_with_timeout_announcement() {
        let state = state(Duration::from_millis(20));
        let conn: Arc<dyn Connection> = Arc::new(DeadConnection);
        state.registry.register("bob", Arc::clone(&conn)).unwrap();

        let session = Arc::new(Session {
            username: "bob".to_string(),
            conn,
            state: Arc::clone(&state),
            torn_down: AtomicBool::new(false),
        });
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let heartbeat = tokio::spawn(heartbeat_loop(Arc::clone(&session), shutdown_rx));

        // The first probe write fails and must trigger teardown.
        heartbeat.await.unwrap();

        assert!(!state.registry.contains("bob"));
        let announcements: Vec<String> = state
            .history
            .get_all()
            .into_iter()
            .filter(|l| l.contains("left the chat (timeout)"))
            .collect();
        assert_eq!(announcements, vec!["[SYSTEM] bob left the chat (timeout)"]);

        // A racing loop arriving second observes a no-op.
        session.teardown(Departure::Left).await;
        assert_eq!(
            state
                .history
                .get_all()
                .iter()
                .filter(|l| l.contains("left the chat"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_heartbeat_without_announcement() {
        let state = state(Duration::from_secs(60));
        let conn: Arc<dyn Connection> = Arc::new(DeadConnection);
        state.registry.register("bob", Arc::clone(&conn)).unwrap();

        let session = Arc::new(Session {
            username: "bob".to_string(),
            conn,
            state: Arc::clone(&state),
            torn_down: AtomicBool::new(false),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let heartbeat = tokio::spawn(heartbeat_loop(Arc::clone(&session), shutdown_rx));

        shutdown_tx.send(true).unwrap();
        heartbeat.await.unwrap();

        // No probe failed, so nothing was torn down or announced.
        assert!(state.registry.contains("bob"));
        assert!(state.history.get_all().is_empty());
    }
}
