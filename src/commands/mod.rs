//! Command Engine
//!
//! Turns decoded requests into replies. A request is looked up by name in
//! the [`CommandRegistry`], its argument count checked against the entry's
//! [`Arity`], and the handler run against the shared store.
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RESP Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │  - Lookup       │
//! │  - Arity        │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! Errors from any layer below become `-ERR ...`/`-WRONGTYPE ...` replies
//! at [`CommandHandler::execute_command`]; nothing here closes a connection.

pub mod error;
pub mod handler;
pub mod registry;

pub use error::{CommandError, CommandResult};
pub use handler::{blocking_reply, CommandHandler, CommandOutcome};
pub use registry::{Arity, CommandFn, CommandRegistry, CommandSpec};
