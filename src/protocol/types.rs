//! RESP Wire Values
//!
//! Every request and every reply that crosses the wire is a [`RespValue`].
//! Requests are always arrays of bulk strings; replies use five shapes:
//!
//! | Shape        | Example                         |
//! |--------------|---------------------------------|
//! | status       | `+OK\r\n`                       |
//! | error        | `-ERR unknown command 'FOO'\r\n` |
//! | integer      | `:3\r\n`                        |
//! | bulk string  | `$5\r\nhello\r\n`, null `$-1\r\n` |
//! | array        | `*2\r\n$1\r\na\r\n$1\r\nb\r\n`, empty `*0\r\n` |
//!
//! The null bulk string means "absent" and the empty array means "no
//! elements". They are different wire values and are never conflated.

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Line terminator for every RESP element.
pub const CRLF: &[u8] = b"\r\n";

/// Type marker bytes.
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A single RESP value, used both for decoded frames and encoded replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Status reply, `+<text>\r\n`. Must not contain CR or LF.
    SimpleString(String),

    /// Error reply, `-<message>\r\n`.
    Error(String),

    /// Signed 64-bit integer, `:<n>\r\n`.
    Integer(i64),

    /// Binary-safe payload, `$<len>\r\n<bytes>\r\n`.
    BulkString(Bytes),

    /// The null bulk string, `$-1\r\n`. Also produced when decoding `*-1`.
    Null,

    /// `*<n>\r\n` followed by `n` values. `Array(vec![])` encodes as `*0\r\n`.
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    /// The null bulk string.
    pub fn null() -> Self {
        RespValue::Null
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    /// An array of bulk strings, the shape of every request and of list replies.
    pub fn bulk_array<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
    {
        RespValue::Array(items.into_iter().map(RespValue::bulk_string).collect())
    }

    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn pong() -> Self {
        RespValue::SimpleString("PONG".to_string())
    }

    /// Encodes the value into a fresh buffer.
    pub fn serialize(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.encoded_len_hint());
        self.encode(&mut dst);
        dst.freeze()
    }

    /// Appends the wire encoding of this value to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            RespValue::SimpleString(s) => put_line(dst, prefix::SIMPLE_STRING, s),
            RespValue::Error(msg) => put_line(dst, prefix::ERROR, msg),
            RespValue::Integer(n) => {
                dst.put_u8(prefix::INTEGER);
                dst.put_slice(n.to_string().as_bytes());
                dst.put_slice(CRLF);
            }
            RespValue::BulkString(data) => {
                dst.put_u8(prefix::BULK_STRING);
                dst.put_slice(data.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                dst.put_slice(data);
                dst.put_slice(CRLF);
            }
            RespValue::Null => dst.put_slice(b"$-1\r\n"),
            RespValue::Array(items) => {
                dst.put_u8(prefix::ARRAY);
                dst.put_slice(items.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                for item in items {
                    item.encode(dst);
                }
            }
        }
    }

    fn encoded_len_hint(&self) -> usize {
        match self {
            RespValue::SimpleString(s) | RespValue::Error(s) => s.len() + 3,
            RespValue::Integer(_) => 24,
            RespValue::BulkString(data) => data.len() + 16,
            RespValue::Null => 5,
            RespValue::Array(items) => 16 + items.iter().map(Self::encoded_len_hint).sum::<usize>(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Payload of a bulk or simple string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RespValue::BulkString(b) => Some(b),
            RespValue::SimpleString(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<Vec<Bytes>> for RespValue {
    fn from(items: Vec<Bytes>) -> Self {
        RespValue::bulk_array(items)
    }
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "{}", s),
            RespValue::Error(msg) => write!(f, "(error) {}", msg),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::BulkString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary, {} bytes)", data.len()),
            },
            RespValue::Null => write!(f, "(nil)"),
            RespValue::Array(items) if items.is_empty() => write!(f, "(empty array)"),
            RespValue::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}) {}", i + 1, item)?;
                }
                Ok(())
            }
        }
    }
}

/// Writes a single-line frame. CR and LF become spaces so the text cannot
/// end the frame early.
fn put_line(dst: &mut BytesMut, marker: u8, text: &str) {
    dst.put_u8(marker);
    dst.extend(text.bytes().map(|b| match b {
        b'\r' | b'\n' => b' ',
        b => b,
    }));
    dst.put_slice(CRLF);
}
