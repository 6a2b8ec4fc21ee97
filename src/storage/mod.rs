//! Storage Engine Module
//!
//! The in-memory key space: a sharded map from binary-safe keys to either a
//! string (optionally with a deadline) or a list, plus the wait queues of
//! clients blocked on those lists.
//!
//! ## Features
//!
//! - **Sharded Storage**: 64 independent shards reduce lock contention
//! - **Typed Values**: strings and lists, with `WRONGTYPE` on mismatch
//! - **Lazy Expiry**: expired keys are removed when next touched
//! - **Blocking Pops**: waiters are served in arrival order on push
//!
//! ## Example
//!
//! ```
//! use ripplekv::storage::{ListEnd, StorageEngine};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let engine = StorageEngine::new();
//!
//! engine.set_string(Bytes::from("name"), Bytes::from("Ariz"), None);
//! assert_eq!(engine.get_string(b"name"), Ok(Some(Bytes::from("Ariz"))));
//!
//! engine.set_string(
//!     Bytes::from("session"),
//!     Bytes::from("token123"),
//!     Some(Duration::from_secs(3600)),
//! );
//!
//! let len = engine
//!     .push_list(Bytes::from("queue"), vec![Bytes::from("job")], ListEnd::Back)
//!     .unwrap();
//! assert_eq!(len, 1);
//! ```

pub mod engine;

pub use engine::{
    KeyType, ListEnd, ListEntry, PopOrWait, StorageEngine, StorageError, StorageResult,
    StringEntry, Value,
};
