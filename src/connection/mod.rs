//! Client Connection Management
//!
//! One async task per client. Each task owns the full session state for
//! its connection — query buffer, decoder, statistics — so nothing here
//! needs a lock: no two operations ever touch the same session
//! concurrently.
//!
//! ```text
//! readable ──> bounded read ──> append to buffer ──┐
//!                                                  ▼
//!                              ┌── drain: decode one command ──┐
//!                              │          │                    │
//!                              │     complete?                 │
//!                              │      │      └─ incomplete ────┼──> wait for
//!                              │      ▼                        │    next read
//!                              │  dispatch ──> reply ──> reset │
//!                              └───────────────────────────────┘
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
