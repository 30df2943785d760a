//! Command Table and Execution
//!
//! ```text
//! argument vector ──> lookup (case-insensitive) ──> arity check ──> handler
//!                         │
//!                         └── miss ──> DispatchError::CommandNotFound
//! ```
//!
//! The table maps lowercase command names to a [`CommandSpec`]: the command
//! variant plus its arity. Arity follows the usual convention — a positive
//! value is an exact argument count (command name included), a negative
//! value is a minimum.

use crate::protocol::{Reply, Value};
use crate::storage::Store;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Dispatch-level errors. These never close the connection; the handler
/// turns them into an error reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The first argument named no known command.
    #[error("unknown command '{0}'")]
    CommandNotFound(String),

    /// The argument count does not satisfy the command's arity.
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),
}

/// The commands this server knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    Get,
    Set,
    Ping,
    Echo,
    Command,
}

/// A command descriptor: what it is and how many arguments it takes.
#[derive(Debug, Clone, Copy)]
struct CommandSpec {
    name: &'static str,
    kind: CommandKind,
    arity: i32,
}

const COMMAND_TABLE: &[CommandSpec] = &[
    CommandSpec {
        name: "get",
        kind: CommandKind::Get,
        arity: 2,
    },
    CommandSpec {
        name: "set",
        kind: CommandKind::Set,
        arity: -3,
    },
    CommandSpec {
        name: "ping",
        kind: CommandKind::Ping,
        arity: -1,
    },
    CommandSpec {
        name: "echo",
        kind: CommandKind::Echo,
        arity: 2,
    },
    CommandSpec {
        name: "command",
        kind: CommandKind::Command,
        arity: -1,
    },
];

/// Name → descriptor lookup table with case-insensitive keys.
#[derive(Debug)]
pub struct CommandTable {
    commands: HashMap<&'static str, CommandSpec>,
}

impl CommandTable {
    pub fn new() -> Self {
        let commands = COMMAND_TABLE.iter().map(|spec| (spec.name, *spec)).collect();
        Self { commands }
    }

    /// Looks up a command by its wire name, case-insensitively. Non-UTF-8
    /// names cannot match anything.
    fn lookup(&self, name: &[u8]) -> Option<&CommandSpec> {
        let name = std::str::from_utf8(name).ok()?;
        self.commands.get(name.to_ascii_lowercase().as_str())
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Executes parsed commands against the store.
///
/// Built once per connection: the table is tiny and the store is shared.
pub struct CommandHandler {
    table: CommandTable,
    store: Arc<Store>,
}

impl CommandHandler {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            table: CommandTable::new(),
            store,
        }
    }

    /// Resolves and runs one command. `args` is a complete argument vector
    /// from the decoder; it must not be empty.
    pub fn execute(&self, args: &[Value]) -> Result<Reply, DispatchError> {
        let name = match args.first() {
            Some(name) => name,
            None => return Err(DispatchError::CommandNotFound(String::new())),
        };

        let spec = self.table.lookup(name.as_bytes()).ok_or_else(|| {
            DispatchError::CommandNotFound(String::from_utf8_lossy(name.as_bytes()).into_owned())
        })?;

        let argc = args.len() as i32;
        let arity_ok = if spec.arity >= 0 {
            argc == spec.arity
        } else {
            argc >= -spec.arity
        };
        if !arity_ok {
            return Err(DispatchError::WrongArity(spec.name));
        }

        Ok(match spec.kind {
            CommandKind::Get => match self.store.get(args[1].as_bytes()) {
                Some(value) => Reply::Bulk(value),
                None => Reply::Nil,
            },
            CommandKind::Set => {
                self.store.set(args[1].as_bytes(), args[2].clone());
                Reply::ok()
            }
            CommandKind::Ping => {
                if args.len() >= 2 {
                    Reply::Bulk(args[1].clone())
                } else {
                    Reply::pong()
                }
            }
            CommandKind::Echo => Reply::Bulk(args[1].clone()),
            CommandKind::Command => Reply::Array(Vec::new()),
        })
    }
}
