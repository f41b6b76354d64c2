//! # Parley Client
//!
//! Interactive terminal client: prompts for credentials, prints every
//! delivered line, answers heartbeat probes, and passively shows the
//! UDP presence snapshots.
//!
//! ## Usage
//!
//! ```bash
//! # Connect to a local server
//! parley-client
//!
//! # Connect elsewhere
//! PARLEY_SERVER_ADDR=10.0.0.5:8888 PARLEY_PRESENCE_PORT=9999 parley-client
//! ```

use anyhow::{Context, Result};
use parley_client::{connect, receive_loop, PresenceListener};
use parley_core::Connection;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8888";
const DEFAULT_PRESENCE_PORT: u16 = 9999;
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush().context("failed to flush stdout")?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read input")?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr and stay quiet by default so they do not mix
    // with the chat output.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley_client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let addr: SocketAddr = std::env::var("PARLEY_SERVER_ADDR")
        .unwrap_or_else(|_| DEFAULT_SERVER_ADDR.to_string())
        .parse()
        .context("invalid PARLEY_SERVER_ADDR")?;
    let presence_port: u16 = std::env::var("PARLEY_PRESENCE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PRESENCE_PORT);

    let username = prompt("Enter username: ")?;
    let secret = prompt("Enter password: ")?;

    let (conn, reader) = connect(addr, IDLE_TIMEOUT, &username, &secret)
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;

    // Presence snapshots arrive on their own socket, independent of the
    // chat connection.
    tokio::spawn(async move {
        let bind_addr = SocketAddr::from(([0, 0, 0, 0], presence_port));
        match PresenceListener::bind(bind_addr).await {
            Ok(listener) => {
                if let Err(e) = listener
                    .run(|users| println!("Online users: {users}"))
                    .await
                {
                    tracing::warn!("presence listener failed: {}", e);
                }
            }
            Err(e) => tracing::warn!("could not bind presence listener: {}", e),
        }
    });

    let recv_conn = Arc::clone(&conn);
    let mut receive = tokio::spawn(async move {
        receive_loop(reader, recv_conn, |line| println!("{line}")).await
    });

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            res = &mut receive => {
                return match res.context("receive loop panicked")? {
                    Ok(()) => {
                        println!("Server closed the connection");
                        Ok(())
                    }
                    Err(e) => {
                        eprintln!("Server connection lost: {e}");
                        std::process::exit(1);
                    }
                };
            }
            line = input.next_line() => match line.context("failed to read stdin")? {
                Some(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        conn.send_line(line)
                            .await
                            .context("failed to send message")?;
                    }
                }
                None => {
                    // stdin closed: leave cleanly.
                    conn.close().await;
                    return Ok(());
                }
            },
        }
    }
}
