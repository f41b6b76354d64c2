//! # parley-core
//!
//! Session registry, message model, history, and routing for the Parley
//! chat service.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Message** - Immutable chat messages with precomputed wire text
//! - **Registry** - The live mapping of username to connection
//! - **Router** - Bounded-queue fan-out over a fixed worker pool
//! - **History** - Bounded recent-message cache backed by a [`Store`]
//! - **Connection** / **Store** / **Authenticator** - Capability seams
//!   implemented by the transport and server crates
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Session   │────▶│   Router    │────▶│  Registry   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │   History   │────▶│    Store    │
//!                     └─────────────┘     └─────────────┘
//! ```

pub mod auth;
pub mod connection;
pub mod history;
pub mod message;
pub mod registry;
pub mod router;
pub mod store;

pub use auth::{AuthError, Authenticator};
pub use connection::{Connection, ConnectionError};
pub use history::History;
pub use message::{utc_timestamp, Message, MessageKind};
pub use registry::{Registry, RegistryError};
pub use router::{Router, RouterConfig, RouterError};
pub use store::{MemoryStore, Store, StoreError, StoredMessage};
