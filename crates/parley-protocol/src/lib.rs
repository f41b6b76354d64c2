//! # parley-protocol
//!
//! Wire protocol definitions for the Parley chat service.
//!
//! The protocol is newline-delimited UTF-8 text:
//!
//! - The client opens with two lines (`username`, `secret`).
//! - Each subsequent non-empty client line is either a command (leading
//!   `/`) or a broadcast message.
//! - Each server line is a delivered message, an `ERR<NNN>: <description>`
//!   error, or a `PING` heartbeat probe.

pub mod command;
pub mod error;

pub use command::{parse_line, ClientInput, Command};
pub use error::ProtocolError;

/// Heartbeat probe line sent by the server.
pub const PING: &str = "PING";

/// Heartbeat reply line a client may send. The server never waits for it;
/// liveness is detected on the probe write, not on the reply.
pub const PONG: &str = "PONG";

/// Leading marker that distinguishes commands from chat lines.
pub const COMMAND_MARKER: char = '/';

/// Serialize a presence snapshot for the UDP side channel.
///
/// One datagram carries one comma-joined username list, no framing.
#[must_use]
pub fn presence_payload(usernames: &[String]) -> String {
    usernames.join(",")
}
