//! RESP Protocol Codec
//!
//! - `types`: [`RespValue`] and its wire encoding
//! - `parser`: the resumable frame decoder
//! - `command`: turning a request frame into a [`Command`]
//!
//! ```
//! use ripplekv::protocol::{parse_message, Command, RespValue};
//!
//! let data = b"*2\r\n$3\r\nget\r\n$4\r\nname\r\n";
//! let (frame, consumed) = parse_message(data).unwrap().unwrap();
//! assert_eq!(consumed, data.len());
//!
//! let cmd = Command::from_frame(frame).unwrap().unwrap();
//! assert_eq!(cmd.name, "GET");
//!
//! assert_eq!(&RespValue::null().serialize()[..], b"$-1\r\n");
//! ```

pub mod command;
pub mod parser;
pub mod types;

pub use command::Command;
pub use parser::{parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
