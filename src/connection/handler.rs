//! Connection Handler Module
//!
//! One client session: read bytes, decode frames, execute, reply, repeat.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────────────┐
//!    │      Main Loop                       │
//!    │                                      │
//!    │  Read bytes ──> Parse ──> Execute    │
//!    │                              │       │
//!    │              ┌───────────────┤       │
//!    │              ▼               ▼       │
//!    │        Reply(value)    Block(pop)    │
//!    │              │               │       │
//!    │              │     await pop, still  │
//!    │              │     reading socket    │
//!    │              ▼               ▼       │
//!    │           Send response              │
//!    │              │                       │
//!    │         [Loop back]                  │
//!    └──────────────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / error
//! ```
//!
//! ## Buffer Management
//!
//! Incoming data accumulates in a `BytesMut`. A read may end mid-frame or
//! carry several pipelined frames; the parser reports an incomplete frame
//! and the loop reads more. While a client is blocked, bytes it sends are
//! kept in the buffer and processed after the blocking reply.

use crate::blocking::BlockingPop;
use crate::commands::{blocking_reply, CommandHandler, CommandOutcome};
use crate::protocol::parser::MAX_BULK_SIZE;
use crate::protocol::{ParseError, RespParser, RespValue};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

/// Largest amount of unparsed input kept per client: one maximal bulk
/// string plus room for its framing.
const MAX_BUFFER_SIZE: usize = MAX_BULK_SIZE + 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Clients currently waiting in a blocking command
    pub blocked_clients: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new connection and returns its client id, starting at 1.
    pub fn connection_opened(&self) -> u64 {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.connections_accepted.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection over any byte stream.
///
/// Owns the read buffer and the parser for one client. A blocking command
/// suspends only this session.
pub struct ConnectionHandler<S> {
    stream: BufWriter<S>,

    /// Client's address (for logging)
    peer: String,

    client_id: u64,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Executes commands on behalf of `client_id`
    command_handler: CommandHandler,

    parser: RespParser,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler and registers it in `stats`.
    pub fn new(
        stream: S,
        peer: impl Into<String>,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        let client_id = stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            peer: peer.into(),
            client_id,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler: command_handler.for_client(client_id),
            parser: RespParser::new(),
            stats,
        }
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    /// Runs the session until the client disconnects or an I/O error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.peer, id = self.client_id, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.peer, "Client disconnected gracefully"),
            Err(ConnectionError::ClientDisconnected) => {
                info!(client = %self.peer, "Client disconnected")
            }
            Err(ConnectionError::IoError(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.peer, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.peer, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            loop {
                let frame = match self.try_parse_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => {
                        // The stream position is unknown after a malformed
                        // frame, so everything buffered is dropped.
                        warn!(client = %self.peer, error = %e, "Protocol error");
                        self.buffer.clear();
                        let reply = RespValue::error(format!("ERR Protocol error: {}", e));
                        self.send_response(&reply).await?;
                        break;
                    }
                };

                let Some(outcome) = self.command_handler.execute(frame) else {
                    continue;
                };
                self.stats.command_processed();

                let response = match outcome {
                    CommandOutcome::Reply(response) => response,
                    CommandOutcome::Block(pop) => self.wait_blocked(pop).await?,
                };
                self.send_response(&response).await?;
            }

            self.read_more_data().await?;
        }
    }

    /// Attempts to parse one frame from the buffer.
    fn try_parse_frame(&mut self) -> Result<Option<RespValue>, ParseError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.buffer)? {
            Some((value, consumed)) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.peer,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Parsed frame"
                );
                Ok(Some(value))
            }
            None => {
                trace!(
                    client = %self.peer,
                    buffered = self.buffer.len(),
                    "Incomplete frame, need more data"
                );
                Ok(None)
            }
        }
    }

    /// Awaits a blocking pop while watching the socket.
    ///
    /// EOF abandons the wait; dropping `pop` withdraws the registration so
    /// no value is handed to a client that is gone. Other input is buffered.
    async fn wait_blocked(&mut self, pop: BlockingPop) -> Result<RespValue, ConnectionError> {
        debug!(client = %self.peer, key = ?pop.key(), timeout = ?pop.timeout(), "Client blocked");
        self.stats.blocked_clients.fetch_add(1, Ordering::Relaxed);

        let result = self.await_delivery(pop).await;

        self.stats.blocked_clients.fetch_sub(1, Ordering::Relaxed);
        result
    }

    async fn await_delivery(&mut self, pop: BlockingPop) -> Result<RespValue, ConnectionError> {
        let wait = pop.wait();
        tokio::pin!(wait);

        loop {
            tokio::select! {
                biased;

                delivery = &mut wait => return Ok(blocking_reply(delivery)),

                read = self.stream.get_mut().read_buf(&mut self.buffer) => {
                    let n = read?;
                    if n == 0 {
                        debug!(client = %self.peer, "Client left while blocked");
                        return Err(ConnectionError::ClientDisconnected);
                    }
                    self.stats.bytes_read(n);
                    if self.buffer.len() >= MAX_BUFFER_SIZE {
                        return Err(ConnectionError::BufferFull);
                    }
                    trace!(client = %self.peer, bytes = n, "Buffered input while blocked");
                }
            }
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(
                client = %self.peer,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial frame in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.peer, bytes = n, "Read data");

        Ok(())
    }

    /// Sends a response to the client.
    async fn send_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.peer,
            bytes = bytes.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial frame)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Serves one accepted TCP connection to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr.to_string(), command_handler, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
