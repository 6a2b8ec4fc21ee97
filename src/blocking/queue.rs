//! Per-key FIFO queues of clients blocked on a list.
//!
//! The queues live inside a storage shard and are only touched while that
//! shard's write lock is held, so admission, hand-off and cancellation for a
//! key are serialized with every push and pop on the same key.

use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;

/// What a satisfied waiter receives: the key it popped from and the value.
pub type Delivery = (Bytes, Bytes);

/// A client waiting for data on one key.
#[derive(Debug)]
pub struct Waiter {
    /// Unique per registration.
    pub id: u64,
    /// Connection that issued the blocking command.
    pub client_id: u64,
    pub registered_at: Instant,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
    sender: oneshot::Sender<Delivery>,
}

impl Waiter {
    pub fn new(
        id: u64,
        client_id: u64,
        timeout: Option<Duration>,
        sender: oneshot::Sender<Delivery>,
    ) -> Self {
        Self {
            id,
            client_id,
            registered_at: Instant::now(),
            timeout,
            sender,
        }
    }
}

/// All wait queues of one shard.
#[derive(Debug, Default)]
pub struct WaitQueues {
    queues: HashMap<Bytes, VecDeque<Waiter>>,
}

impl WaitQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a waiter behind everyone already waiting on `key`.
    pub fn enqueue(&mut self, key: Bytes, waiter: Waiter) {
        debug!(
            key = ?key,
            waiter = waiter.id,
            client = waiter.client_id,
            timeout = ?waiter.timeout,
            "Client blocked on list"
        );
        self.queues.entry(key).or_default().push_back(waiter);
    }

    /// Removes a waiter that is still queued.
    ///
    /// Returns `false` when the waiter is no longer queued, which means a
    /// push already handed it a value.
    pub fn cancel(&mut self, key: &[u8], id: u64) -> bool {
        let Some(queue) = self.queues.get_mut(key) else {
            return false;
        };

        let before = queue.len();
        queue.retain(|w| w.id != id);
        let removed = queue.len() != before;

        if queue.is_empty() {
            self.queues.remove(key);
        }
        removed
    }

    /// Number of clients waiting on `key`.
    pub fn waiting(&self, key: &[u8]) -> usize {
        self.queues.get(key).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Serves waiters on `key` from the front of `list`, oldest waiter first,
    /// one value each, until either runs out.
    ///
    /// A waiter whose receiver is gone (its connection closed) gives the value
    /// back to the list and the next waiter is tried.
    ///
    /// Returns the number of values delivered.
    pub fn hand_off(&mut self, key: &Bytes, list: &mut VecDeque<Bytes>) -> usize {
        let Some(queue) = self.queues.get_mut(key) else {
            return 0;
        };

        let mut delivered = 0;
        while let Some(value) = list.pop_front() {
            let Some(waiter) = queue.pop_front() else {
                list.push_front(value);
                break;
            };

            match waiter.sender.send((key.clone(), value)) {
                Ok(()) => {
                    delivered += 1;
                    debug!(
                        key = ?key,
                        waiter = waiter.id,
                        client = waiter.client_id,
                        waited_ms = waiter.registered_at.elapsed().as_millis() as u64,
                        "Handed value to blocked client"
                    );
                }
                Err((_, value)) => {
                    debug!(key = ?key, waiter = waiter.id, "Skipping closed waiter");
                    list.push_front(value);
                }
            }
        }

        if queue.is_empty() {
            self.queues.remove(key);
        }
        delivered
    }
}
