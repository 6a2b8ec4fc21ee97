//! Client sessions
//!
//! A [`ConnectionHandler`] owns one client stream (`TcpStream` in the server,
//! any `AsyncRead + AsyncWrite` in tests) and runs on its own task. It keeps
//! a read buffer, decodes as many frames as the buffer holds and answers
//! them in order, so pipelined requests work without extra handling.
//!
//! A `BLPOP` that has to wait parks the session, not the server. While
//! parked the session still reads from its stream: a closed stream drops the
//! wait (returning any value it was handed to the list), and bytes that
//! arrive meanwhile are buffered and executed once the wait resolves.
//!
//! ```ignore
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler.clone(), Arc::clone(&stats)));
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
