//! # parley-transport
//!
//! TCP line transport for the Parley chat service.
//!
//! The wire is newline-delimited UTF-8 text. A connection splits into a
//! [`TcpLineConnection`] (the deadline-bounded write side, implementing
//! the core [`Connection`](parley_core::Connection) seam) and a
//! [`LineReader`] (the deadline-bounded read side owned by the session's
//! read loop).

pub mod tcp;

pub use tcp::{split, LineReader, TcpLineConnection};
