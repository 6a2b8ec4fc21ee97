//! Command-level errors and their error replies.

use crate::protocol::RespValue;
use crate::storage::StorageError;
use thiserror::Error;

/// Why a command was rejected.
///
/// The `Display` text is exactly what goes on the wire after the `-`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Holds the lowercased command name.
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR value is out of range, must be positive")]
    OutOfRange,

    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpireTime(String),

    #[error("ERR timeout is not a float or out of range")]
    InvalidTimeout,

    #[error("ERR timeout is negative")]
    NegativeTimeout,

    #[error("ERR syntax error")]
    Syntax,

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),
}

pub type CommandResult<T> = Result<T, CommandError>;

impl CommandError {
    pub fn wrong_arity(command: &str) -> Self {
        CommandError::WrongArity(command.to_ascii_lowercase())
    }
}

impl From<StorageError> for CommandError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::WrongType => CommandError::WrongType,
        }
    }
}

impl From<CommandError> for RespValue {
    fn from(err: CommandError) -> Self {
        RespValue::error(err.to_string())
    }
}
