//! # RippleKV - An In-Memory Key-Value Server
//!
//! RippleKV speaks a Redis-compatible subset of RESP and stores strings
//! (with optional expiry) and lists. Clients can block on an empty list
//! with `BLPOP` and are woken, oldest first, by pushes from other clients.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              RippleKV                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │ awaits           │                         │
//! │                            ▼                  ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │ BlockingPop │<───│              StorageEngine                   │    │
//! │  │  (oneshot)  │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │    │
//! │  └─────────────┘    │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...64   │ │    │
//! │                     │  │entries │ │entries │ │entries │ │shards  │ │    │
//! │                     │  │waiters │ │waiters │ │waiters │ │        │ │    │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │    │
//! │                     └──────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use ripplekv::commands::CommandHandler;
//! use ripplekv::connection::{handle_connection, ConnectionStats};
//! use ripplekv::storage::StorageEngine;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let storage = Arc::new(StorageEngine::new());
//!     let handler = CommandHandler::new(storage);
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:6379").await?;
//!     loop {
//!         let (stream, addr) = listener.accept().await?;
//!         tokio::spawn(handle_connection(stream, addr, handler.clone(), Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP values, the resumable parser, request commands
//! - [`storage`]: sharded typed store with lazy expiry
//! - [`blocking`]: per-key wait queues and the blocking pop handle
//! - [`commands`]: command table, argument checks, execution
//! - [`connection`]: per-client session over any async byte stream
//! - [`config`]: command-line and environment configuration
//!
//! ## Design Highlights
//!
//! ### One Lock Per Key
//!
//! A key's value and the clients waiting on it live behind the same shard
//! lock. A push and its hand-off to waiters happen in one critical section,
//! so a pushed value is either in the list or with exactly one waiter,
//! never both and never neither.
//!
//! ### Lazy Expiry
//!
//! Expired strings are removed when a command next touches them.

pub mod blocking;
pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandHandler, CommandOutcome};
pub use config::Config;
pub use connection::{handle_connection, ConnectionHandler, ConnectionStats};
pub use protocol::{Command, ParseError, RespParser, RespValue};
pub use storage::StorageEngine;

/// The default port RippleKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host RippleKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of RippleKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
