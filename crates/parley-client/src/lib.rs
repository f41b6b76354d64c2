//! # parley-client
//!
//! Terminal client for the Parley chat service. The TCP side rides the
//! same line transport the server uses: deadline-bounded writes through
//! [`TcpLineConnection`](parley_transport::TcpLineConnection) and line
//! reads through [`LineReader`](parley_transport::LineReader). The UDP
//! side passively listens for presence snapshots.
//!
//! The binary wiring (stdin prompts, printing) lives in `main.rs`;
//! everything here is exposed so tests can drive the loops against a
//! scripted peer.

pub mod presence;
pub mod session;

pub use presence::PresenceListener;
pub use session::{connect, receive_loop};
