//! Blocking list pops
//!
//! A client whose `BLPOP` finds the list empty is parked in a per-key FIFO
//! queue ([`WaitQueues`]) owned by the storage shard of that key, and gets a
//! [`BlockingPop`] handle to await. Pushes serve parked clients before
//! anyone else can observe the pushed values.

pub mod pop;
pub mod queue;

pub use pop::BlockingPop;
pub use queue::{Delivery, WaitQueues, Waiter};
