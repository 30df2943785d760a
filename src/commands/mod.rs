//! Command Dispatch
//!
//! Thin by design: resolve the first argument to a command descriptor,
//! check arity, run the handler. The decoder upstream guarantees dispatch
//! only ever sees fully assembled commands, in arrival order.
//!
//! An unknown name is an explicit [`DispatchError::CommandNotFound`] — the
//! connection answers with an error and stays open. Invoking a handler
//! through a descriptor that was never looked up successfully cannot
//! happen by construction.

pub mod handler;

// Re-export the main command handler
pub use handler::{CommandHandler, CommandTable, DispatchError};
