//! The command table.

use super::error::CommandResult;
use super::handler::{CommandHandler, CommandOutcome};
use bytes::Bytes;
use std::collections::HashMap;

/// Signature shared by every command implementation. `args` excludes the
/// command name.
pub type CommandFn = fn(&CommandHandler, &[Bytes]) -> CommandResult<CommandOutcome>;

/// How many arguments (after the name) a command accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive on both ends.
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(&self, argc: usize) -> bool {
        match *self {
            Arity::Exact(n) => argc == n,
            Arity::AtLeast(n) => argc >= n,
            Arity::Range(min, max) => (min..=max).contains(&argc),
        }
    }
}

/// One row of the table.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Canonical uppercase name.
    pub name: &'static str,
    pub arity: Arity,
    pub handler: CommandFn,
}

/// Name to [`CommandSpec`] lookup, built once and shared by all connections.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    entries: HashMap<&'static str, CommandSpec>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with every command the server supports.
    pub fn with_builtin_commands() -> Self {
        let mut registry = Self::new();
        registry.register_connection_commands();
        registry.register_string_commands();
        registry.register_list_commands();
        registry.register_keyspace_commands();
        registry
    }

    /// Adds or replaces a command.
    pub fn register(&mut self, spec: CommandSpec) {
        self.entries.insert(spec.name, spec);
    }

    /// Looks up an uppercase command name.
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn register_connection_commands(&mut self) {
        self.register(CommandSpec {
            name: "PING",
            arity: Arity::Range(0, 1),
            handler: CommandHandler::cmd_ping,
        });
        self.register(CommandSpec {
            name: "ECHO",
            arity: Arity::Exact(1),
            handler: CommandHandler::cmd_echo,
        });
    }

    fn register_string_commands(&mut self) {
        self.register(CommandSpec {
            name: "SET",
            arity: Arity::AtLeast(2),
            handler: CommandHandler::cmd_set,
        });
        self.register(CommandSpec {
            name: "GET",
            arity: Arity::Exact(1),
            handler: CommandHandler::cmd_get,
        });
    }

    fn register_list_commands(&mut self) {
        self.register(CommandSpec {
            name: "RPUSH",
            arity: Arity::AtLeast(2),
            handler: CommandHandler::cmd_rpush,
        });
        self.register(CommandSpec {
            name: "LPUSH",
            arity: Arity::AtLeast(2),
            handler: CommandHandler::cmd_lpush,
        });
        self.register(CommandSpec {
            name: "LPOP",
            arity: Arity::Range(1, 2),
            handler: CommandHandler::cmd_lpop,
        });
        self.register(CommandSpec {
            name: "RPOP",
            arity: Arity::Range(1, 2),
            handler: CommandHandler::cmd_rpop,
        });
        self.register(CommandSpec {
            name: "LRANGE",
            arity: Arity::Exact(3),
            handler: CommandHandler::cmd_lrange,
        });
        self.register(CommandSpec {
            name: "LLEN",
            arity: Arity::Exact(1),
            handler: CommandHandler::cmd_llen,
        });
        self.register(CommandSpec {
            name: "BLPOP",
            arity: Arity::Exact(2),
            handler: CommandHandler::cmd_blpop,
        });
    }

    fn register_keyspace_commands(&mut self) {
        self.register(CommandSpec {
            name: "TYPE",
            arity: Arity::Exact(1),
            handler: CommandHandler::cmd_type,
        });
        self.register(CommandSpec {
            name: "DEL",
            arity: Arity::AtLeast(1),
            handler: CommandHandler::cmd_del,
        });
        self.register(CommandSpec {
            name: "EXISTS",
            arity: Arity::AtLeast(1),
            handler: CommandHandler::cmd_exists,
        });
        self.register(CommandSpec {
            name: "DBSIZE",
            arity: Arity::Exact(0),
            handler: CommandHandler::cmd_dbsize,
        });
        self.register(CommandSpec {
            name: "FLUSHDB",
            arity: Arity::Exact(0),
            handler: CommandHandler::cmd_flushdb,
        });
    }
}
