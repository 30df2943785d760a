//! # emberkv — Ingestion Core of an In-Memory Data-Structure Server
//!
//! emberkv turns the raw byte stream of a client connection into fully
//! formed commands and executes them against a small in-memory keyspace.
//! The hard part — and the focus of this crate — is the inbound path: a
//! resumable protocol decoder that assembles commands from a stream the
//! network may split at any byte, never blocks, avoids quadratic copying
//! for multi-megabyte arguments, and enforces strict size limits against
//! hostile input.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    ┌────────────────────────────────────┐
//! │ TCP Listener │───>│ ConnectionHandler (one task each)  │
//! │  (main.rs)   │    │                                    │
//! └──────────────┘    │  QueryBuffer ──> RequestDecoder    │
//!                     │       │               │            │
//!                     │   raw bytes      Vec<Value>        │
//!                     │                       │            │
//!                     │                       ▼            │
//!                     │               CommandHandler ───────┼──> Store
//!                     │                       │            │
//!                     │                     Reply          │
//!                     └────────────────────────────────────┘
//! ```
//!
//! ## Design Highlights
//!
//! ### Resumable decoding
//!
//! The decoder is a state machine over the per-connection [`protocol::QueryBuffer`].
//! When a command is only partially buffered it reports incomplete and
//! keeps its place; feeding the same bytes in any chunking produces the
//! same commands (chunking invariance). Grammar-level limits (element
//! count, bulk length, header line size) bound what a hostile peer can
//! make the server buffer.
//!
//! ### Dual-encoding values
//!
//! Arguments become [`protocol::Value`]s: payloads up to 44 bytes share a
//! single allocation with their refcount, larger ones own an independent
//! buffer. Arguments of 32 KB and up can adopt the query buffer's storage
//! outright instead of being copied.
//!
//! ### Single-owner sessions
//!
//! Each connection's task owns all of its session state, so the decode
//! path needs no locks; only the keyspace itself is shared.
//!
//! ## Module Overview
//!
//! - [`protocol`]: query buffer, request decoder, value model, replies
//! - [`commands`]: thin name→descriptor dispatch
//! - [`connection`]: per-client session loop
//! - [`storage`]: the shared keyspace

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandHandler, DispatchError};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{Decode, ProtocolError, QueryBuffer, Reply, RequestDecoder, Value};
pub use storage::Store;

/// The default port emberkv listens on
pub const DEFAULT_PORT: u16 = 6379;

/// The default host emberkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of emberkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
