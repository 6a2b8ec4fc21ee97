//! Resumable RESP Frame Decoder
//!
//! TCP delivers a byte stream, not messages, so a frame may arrive split over
//! many reads or several frames may arrive in one read. The decoder never
//! assumes a read is a whole frame:
//!
//! - `Ok(Some((value, consumed)))`: a complete frame occupied the first
//!   `consumed` bytes of the buffer.
//! - `Ok(None)`: the buffer holds a prefix of a frame. Keep the bytes, read
//!   more, call again.
//! - `Err(ParseError)`: the bytes can never form a valid frame.
//!
//! Decoding is recursive descent over byte offsets. Bulk payloads are taken
//! by their declared length, so a payload containing `\r\n` is read intact.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while decoding a frame.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Negative bulk length other than the `-1` null marker.
    #[error("invalid bulk length: {0}")]
    InvalidBulkLength(i64),

    /// Negative array length other than the `-1` null marker.
    #[error("invalid multibulk length: {0}")]
    InvalidArrayLength(i64),

    #[error("{0}")]
    ProtocolError(String),

    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The frame decoded fine but is not a command (e.g. a bare integer).
    #[error("invalid command frame: {0}")]
    InvalidCommand(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Largest accepted bulk payload (512 MiB).
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Longest accepted inline command line (64 KiB).
pub const MAX_INLINE_SIZE: usize = 64 * 1024;

/// Deepest accepted array nesting.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Stateless apart from its limits; one per connection is customary.
#[derive(Debug, Clone)]
pub struct RespParser {
    max_bulk_size: usize,
    max_depth: usize,
}

impl Default for RespParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RespParser {
    pub fn new() -> Self {
        Self {
            max_bulk_size: MAX_BULK_SIZE,
            max_depth: MAX_NESTING_DEPTH,
        }
    }

    /// Overrides the bulk payload limit.
    pub fn with_max_bulk_size(mut self, max: usize) -> Self {
        self.max_bulk_size = max;
        self
    }

    /// Attempts to decode one frame from the front of `buf`.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        self.parse_at(buf, 0, 0)
    }

    /// Decodes the value starting at `pos`; the returned offset is absolute.
    fn parse_at(
        &self,
        buf: &[u8],
        pos: usize,
        depth: usize,
    ) -> ParseResult<Option<(RespValue, usize)>> {
        let Some(&marker) = buf.get(pos) else {
            return Ok(None);
        };

        match marker {
            prefix::SIMPLE_STRING => Ok(read_line(buf, pos + 1)?
                .map(|(line, next)| (RespValue::SimpleString(line.to_string()), next))),
            prefix::ERROR => Ok(read_line(buf, pos + 1)?
                .map(|(line, next)| (RespValue::Error(line.to_string()), next))),
            prefix::INTEGER => match read_line(buf, pos + 1)? {
                Some((line, next)) => Ok(Some((RespValue::Integer(parse_int(line)?), next))),
                None => Ok(None),
            },
            prefix::BULK_STRING => self.parse_bulk(buf, pos + 1),
            prefix::ARRAY => self.parse_array(buf, pos + 1, depth),
            // Anything else at the start of a top-level frame is an inline command.
            _ if depth == 0 => parse_inline(buf, pos),
            other => Err(ParseError::UnknownPrefix(other)),
        }
    }

    fn parse_bulk(&self, buf: &[u8], pos: usize) -> ParseResult<Option<(RespValue, usize)>> {
        let Some((line, data_start)) = read_line(buf, pos)? else {
            return Ok(None);
        };

        let len = parse_int(line)?;
        if len == -1 {
            return Ok(Some((RespValue::Null, data_start)));
        }
        if len < 0 {
            return Err(ParseError::InvalidBulkLength(len));
        }

        let len = len as usize;
        if len > self.max_bulk_size {
            return Err(ParseError::MessageTooLarge {
                size: len,
                max: self.max_bulk_size,
            });
        }

        let data_end = data_start + len;
        if buf.len() < data_end + CRLF.len() {
            return Ok(None);
        }
        if &buf[data_end..data_end + CRLF.len()] != CRLF {
            return Err(ParseError::ProtocolError(
                "bulk string missing trailing CRLF".to_string(),
            ));
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_end]);
        Ok(Some((RespValue::BulkString(data), data_end + CRLF.len())))
    }

    fn parse_array(
        &self,
        buf: &[u8],
        pos: usize,
        depth: usize,
    ) -> ParseResult<Option<(RespValue, usize)>> {
        if depth >= self.max_depth {
            return Err(ParseError::ProtocolError(format!(
                "maximum nesting depth exceeded: {}",
                self.max_depth
            )));
        }

        let Some((line, mut next)) = read_line(buf, pos)? else {
            return Ok(None);
        };

        let count = parse_int(line)?;
        if count == -1 {
            return Ok(Some((RespValue::Null, next)));
        }
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        // Do not trust the declared count for the allocation.
        let mut items = Vec::with_capacity((count as usize).min(1024));
        for _ in 0..count {
            match self.parse_at(buf, next, depth + 1)? {
                Some((item, after)) => {
                    items.push(item);
                    next = after;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((RespValue::Array(items), next)))
    }
}

/// Reads a CRLF-terminated UTF-8 line starting at `pos`.
fn read_line(buf: &[u8], pos: usize) -> ParseResult<Option<(&str, usize)>> {
    let Some(rest) = buf.get(pos..) else {
        return Ok(None);
    };
    let Some(len) = find_crlf(rest) else {
        return Ok(None);
    };

    let line = std::str::from_utf8(&rest[..len]).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    Ok(Some((line, pos + len + CRLF.len())))
}

fn parse_int(line: &str) -> ParseResult<i64> {
    line.parse()
        .map_err(|_| ParseError::InvalidInteger(line.to_string()))
}

/// `PING\r\n` style commands typed into telnet or redis-cli.
fn parse_inline(buf: &[u8], pos: usize) -> ParseResult<Option<(RespValue, usize)>> {
    let pending = buf.len() - pos;
    let Some((line, next)) = read_line(buf, pos)? else {
        if pending > MAX_INLINE_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: pending,
                max: MAX_INLINE_SIZE,
            });
        }
        return Ok(None);
    };
    if line.len() > MAX_INLINE_SIZE {
        return Err(ParseError::MessageTooLarge {
            size: line.len(),
            max: MAX_INLINE_SIZE,
        });
    }

    let items: Vec<RespValue> = line
        .split_whitespace()
        .map(|word| RespValue::BulkString(Bytes::copy_from_slice(word.as_bytes())))
        .collect();

    // A blank line decodes to an empty command, which callers ignore.
    Ok(Some((RespValue::Array(items), next)))
}

#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Decodes a single frame with default limits.
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    RespParser::new().parse(buf)
}
