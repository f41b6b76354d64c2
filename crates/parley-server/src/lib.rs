//! # parley-server
//!
//! TCP chat server with a UDP presence side channel.
//!
//! The binary wiring lives in `main.rs`; everything here is exposed so
//! integration tests can assemble a server in-process.

pub mod auth;
pub mod config;
pub mod metrics;
pub mod presence;
pub mod server;
pub mod session;
pub mod store;

pub use auth::BcryptAuthenticator;
pub use config::Config;
pub use presence::PresencePublisher;
pub use server::{ChatServer, ServerState};
pub use store::SqliteStore;
