//! Request frames as commands.

use crate::protocol::parser::ParseError;
use crate::protocol::types::RespValue;
use bytes::Bytes;

/// A decoded request: an uppercased command name plus its raw arguments.
///
/// `["set", "k", "v"]` on the wire becomes `Command { name: "SET", args: [k, v] }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<Bytes>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<Bytes>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            args,
        }
    }

    /// Builds a command from a decoded frame.
    ///
    /// Returns `Ok(None)` for an empty array, which clients may send and
    /// servers silently skip.
    pub fn from_frame(frame: RespValue) -> Result<Option<Self>, ParseError> {
        let items = match frame {
            RespValue::Array(items) => items,
            other => {
                return Err(ParseError::InvalidCommand(format!(
                    "expected an array of bulk strings, got {}",
                    kind_of(&other)
                )))
            }
        };

        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            match item {
                RespValue::BulkString(b) => parts.push(b),
                RespValue::SimpleString(s) => parts.push(Bytes::from(s)),
                other => {
                    return Err(ParseError::InvalidCommand(format!(
                        "expected bulk string argument, got {}",
                        kind_of(&other)
                    )))
                }
            }
        }

        let mut parts = parts.into_iter();
        let Some(name) = parts.next() else {
            return Ok(None);
        };

        let name = std::str::from_utf8(&name)
            .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?
            .to_ascii_uppercase();

        Ok(Some(Self {
            name,
            args: parts.collect(),
        }))
    }
}

fn kind_of(value: &RespValue) -> &'static str {
    match value {
        RespValue::SimpleString(_) => "simple string",
        RespValue::Error(_) => "error",
        RespValue::Integer(_) => "integer",
        RespValue::BulkString(_) => "bulk string",
        RespValue::Null => "null",
        RespValue::Array(_) => "array",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_uppercased() {
        let frame = RespValue::bulk_array(vec!["lPuSh", "k", "v"]);
        let cmd = Command::from_frame(frame).unwrap().unwrap();
        assert_eq!(cmd.name, "LPUSH");
        assert_eq!(cmd.args, vec![Bytes::from("k"), Bytes::from("v")]);
    }

    #[test]
    fn test_arguments_keep_their_case() {
        let frame = RespValue::bulk_array(vec!["echo", "Hello"]);
        let cmd = Command::from_frame(frame).unwrap().unwrap();
        assert_eq!(cmd.args, vec![Bytes::from("Hello")]);
    }

    #[test]
    fn test_empty_array_is_skipped() {
        assert_eq!(Command::from_frame(RespValue::array(vec![])).unwrap(), None);
    }

    #[test]
    fn test_non_array_frames_are_rejected() {
        assert!(matches!(
            Command::from_frame(RespValue::integer(1)),
            Err(ParseError::InvalidCommand(_))
        ));
        assert!(matches!(
            Command::from_frame(RespValue::array(vec![RespValue::integer(1)])),
            Err(ParseError::InvalidCommand(_))
        ));
    }
}
