//! Sharded Storage Engine
//!
//! Keys are spread over a fixed number of shards by hash. Each shard is one
//! `RwLock` around the shard's key map *and* the wait queues of the blocked
//! clients for the keys in that shard. Keeping both under one lock makes the
//! operations on a single key linearizable, blocking registrations
//! included: a pop, a push, its hand-off to waiters and a timeout
//! cancellation never interleave.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      StorageEngine                       │
//! │  ┌────────────────┐ ┌────────────────┐     ┌──────────┐  │
//! │  │ Shard 0        │ │ Shard 1        │ ... │ Shard 63 │  │
//! │  │ RwLock {       │ │ RwLock {       │     │          │  │
//! │  │   entries,     │ │   entries,     │     │          │  │
//! │  │   waiters }    │ │   waiters }    │     │          │  │
//! │  └────────────────┘ └────────────────┘     └──────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Expiry is lazy. Every read path first evicts an expired string entry and
//! then behaves as if it never existed; nothing sweeps in the background.

use crate::blocking::{BlockingPop, WaitQueues, Waiter};
use bytes::Bytes;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::trace;

/// Number of shards. Power of two so the modulo is cheap.
const NUM_SHARDS: usize = 64;

/// Errors raised by store operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A string value with an optional deadline.
#[derive(Debug, Clone)]
pub struct StringEntry {
    pub value: Bytes,
    /// `None` means the key never expires.
    pub expires_at: Option<Instant>,
}

impl StringEntry {
    /// A TTL too large for the clock to represent never expires.
    pub fn new(value: Bytes, ttl: Option<Duration>) -> Self {
        Self::with_deadline(value, ttl.and_then(|ttl| Instant::now().checked_add(ttl)))
    }

    pub fn with_deadline(value: Bytes, expires_at: Option<Instant>) -> Self {
        Self { value, expires_at }
    }

    /// Expired at or after the deadline; once true it stays true.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// A list value. Never stored empty.
#[derive(Debug, Clone, Default)]
pub struct ListEntry {
    pub data: VecDeque<Bytes>,
}

/// The single value a key can hold.
#[derive(Debug, Clone)]
pub enum Value {
    String(StringEntry),
    List(ListEntry),
}

impl Value {
    fn is_expired(&self) -> bool {
        match self {
            Value::String(entry) => entry.is_expired(),
            Value::List(_) => false,
        }
    }

    fn key_type(&self) -> KeyType {
        match self {
            Value::String(_) => KeyType::String,
            Value::List(_) => KeyType::List,
        }
    }
}

/// Answer of the `TYPE` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    None,
    String,
    List,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::None => "none",
            KeyType::String => "string",
            KeyType::List => "list",
        }
    }
}

/// Which end of a list an operation works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEnd {
    Front,
    Back,
}

/// Result of [`StorageEngine::pop_or_wait`].
#[derive(Debug)]
pub enum PopOrWait {
    /// The list had data; this is its former head.
    Ready(Bytes),
    /// The list was empty; the caller is now queued.
    Waiting(BlockingPop),
}

#[derive(Debug, Default)]
struct ShardData {
    entries: HashMap<Bytes, Value>,
    waiters: WaitQueues,
}

#[derive(Debug, Default)]
struct Shard {
    inner: RwLock<ShardData>,
}

impl Shard {
    // Every mutation is a single map or deque call, so a poisoned shard
    // still holds consistent data.
    fn read(&self) -> RwLockReadGuard<'_, ShardData> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ShardData> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes `key` if it holds an expired string. Returns whether it did.
fn evict_if_expired(entries: &mut HashMap<Bytes, Value>, key: &[u8]) -> bool {
    if entries.get(key).is_some_and(Value::is_expired) {
        entries.remove(key);
        trace!(key = ?Bytes::copy_from_slice(key), "Evicted expired key");
        return true;
    }
    false
}

/// Normalizes `LRANGE` style inclusive indices against `len`.
///
/// Negative indices count from the end. Returns `None` for an empty range.
fn normalize_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { len + start } else { start }.max(0);
    let stop = if stop < 0 { len + stop } else { stop }.min(len - 1);

    if len == 0 || start > stop {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// The shared key space.
///
/// Wrap it in an `Arc` and hand a clone to every connection's command
/// handler. All methods take `&self` and complete without awaiting.
pub struct StorageEngine {
    shards: Vec<Shard>,
    next_waiter_id: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("keys", &self.len())
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
            next_waiter_id: AtomicU64::new(1),
        }
    }

    #[inline]
    fn shard(&self, key: &[u8]) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    /// Runs `f` on the live entry for `key`, evicting it first if expired.
    ///
    /// The common case only takes the read lock.
    fn with_live<R>(&self, key: &[u8], f: impl FnOnce(Option<&Value>) -> R) -> R {
        let shard = self.shard(key);
        {
            let data = shard.read();
            match data.entries.get(key) {
                Some(value) if value.is_expired() => {}
                live => return f(live),
            }
        }

        let mut data = shard.write();
        evict_if_expired(&mut data.entries, key);
        f(data.entries.get(key))
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    /// Returns the string stored at `key`, or `None` when absent or expired.
    pub fn get_string(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        self.with_live(key, |value| match value {
            None => Ok(None),
            Some(Value::String(entry)) => Ok(Some(entry.value.clone())),
            Some(Value::List(_)) => Err(StorageError::WrongType),
        })
    }

    /// Stores a string, replacing whatever `key` held before.
    pub fn set_string(&self, key: Bytes, value: Bytes, ttl: Option<Duration>) {
        self.insert_string(key, StringEntry::new(value, ttl));
    }

    /// Like [`set_string`](Self::set_string) with an absolute deadline.
    pub fn set_string_until(&self, key: Bytes, value: Bytes, expires_at: Option<Instant>) {
        self.insert_string(key, StringEntry::with_deadline(value, expires_at));
    }

    fn insert_string(&self, key: Bytes, entry: StringEntry) {
        let mut data = self.shard(&key).write();
        data.entries.insert(key, Value::String(entry));
    }

    // ------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------

    /// Pushes `values` onto the list at `key`, creating it if needed.
    ///
    /// `Back` appends in argument order. `Front` prepends the values one at
    /// a time, so `LPUSH k a b c` leaves `c b a`.
    ///
    /// Clients blocked on `key` are then served from the head of the list,
    /// oldest first, before this call returns. The returned length is the
    /// list length after the push and before that hand-off.
    pub fn push_list(&self, key: Bytes, values: Vec<Bytes>, end: ListEnd) -> StorageResult<usize> {
        let mut guard = self.shard(&key).write();
        let ShardData { entries, waiters } = &mut *guard;
        evict_if_expired(entries, &key);

        if matches!(entries.get(&key), Some(Value::String(_))) {
            return Err(StorageError::WrongType);
        }
        let Value::List(list) = entries
            .entry(key.clone())
            .or_insert_with(|| Value::List(ListEntry::default()))
        else {
            return Err(StorageError::WrongType);
        };

        for value in values {
            match end {
                ListEnd::Front => list.data.push_front(value),
                ListEnd::Back => list.data.push_back(value),
            }
        }
        let pushed_len = list.data.len();

        waiters.hand_off(&key, &mut list.data);
        if list.data.is_empty() {
            entries.remove(&key);
        }

        Ok(pushed_len)
    }

    /// Removes up to `count` values from one end of the list at `key`.
    ///
    /// Returns `None` when the key does not exist. A list drained to empty is
    /// deleted.
    pub fn pop_list(&self, key: &[u8], end: ListEnd, count: usize) -> StorageResult<Option<Vec<Bytes>>> {
        let mut data = self.shard(key).write();
        evict_if_expired(&mut data.entries, key);

        let list = match data.entries.get_mut(key) {
            None => return Ok(None),
            Some(Value::String(_)) => return Err(StorageError::WrongType),
            Some(Value::List(list)) => list,
        };

        let take = count.min(list.data.len());
        let popped: Vec<Bytes> = match end {
            ListEnd::Front => list.data.drain(..take).collect(),
            ListEnd::Back => {
                let from = list.data.len() - take;
                list.data.drain(from..).rev().collect()
            }
        };

        if list.data.is_empty() {
            data.entries.remove(key);
        }
        Ok(Some(popped))
    }

    /// Returns the inclusive range `start..=stop` of the list at `key`.
    ///
    /// Out-of-range indices are clamped; an empty or inverted range, or a
    /// missing key, gives an empty vector.
    pub fn range_list(&self, key: &[u8], start: i64, stop: i64) -> StorageResult<Vec<Bytes>> {
        self.with_live(key, |value| match value {
            None => Ok(Vec::new()),
            Some(Value::String(_)) => Err(StorageError::WrongType),
            Some(Value::List(list)) => Ok(normalize_range(list.data.len(), start, stop)
                .map(|(from, to)| list.data.range(from..=to).cloned().collect())
                .unwrap_or_default()),
        })
    }

    /// Length of the list at `key`; 0 when absent.
    pub fn length_of(&self, key: &[u8]) -> StorageResult<usize> {
        self.with_live(key, |value| match value {
            None => Ok(0),
            Some(Value::String(_)) => Err(StorageError::WrongType),
            Some(Value::List(list)) => Ok(list.data.len()),
        })
    }

    // ------------------------------------------------------------------
    // Blocking pops
    // ------------------------------------------------------------------

    /// Pops the head of the list at `key`, or queues the caller behind any
    /// earlier waiters when there is nothing to pop.
    ///
    /// The emptiness check and the registration happen under one lock, so a
    /// push can never slip in between and be missed. `timeout` of `None`
    /// waits forever.
    pub fn pop_or_wait(
        self: &Arc<Self>,
        key: Bytes,
        client_id: u64,
        timeout: Option<Duration>,
    ) -> StorageResult<PopOrWait> {
        let mut guard = self.shard(&key).write();
        let ShardData { entries, waiters } = &mut *guard;
        evict_if_expired(entries, &key);

        match entries.get_mut(&key) {
            Some(Value::String(_)) => return Err(StorageError::WrongType),
            Some(Value::List(list)) => {
                if let Some(value) = list.data.pop_front() {
                    if list.data.is_empty() {
                        entries.remove(&key);
                    }
                    return Ok(PopOrWait::Ready(value));
                }
            }
            None => {}
        }

        let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        waiters.enqueue(key.clone(), Waiter::new(id, client_id, timeout, sender));

        Ok(PopOrWait::Waiting(BlockingPop::new(
            Arc::clone(self),
            key,
            id,
            timeout,
            receiver,
        )))
    }

    /// Withdraws a queued waiter. `false` means it was already served.
    pub(crate) fn cancel_wait(&self, key: &[u8], id: u64) -> bool {
        self.shard(key).write().waiters.cancel(key, id)
    }

    /// Puts a value that reached a vanished waiter back at the head of its
    /// list, serving the next waiter if there is one.
    ///
    /// Returns `false` if the key meanwhile became a string.
    pub(crate) fn requeue_front(&self, key: Bytes, value: Bytes) -> bool {
        self.push_list(key, vec![value], ListEnd::Front).is_ok()
    }

    /// Number of clients blocked on `key`.
    pub fn waiting_on(&self, key: &[u8]) -> usize {
        self.shard(key).read().waiters.waiting(key)
    }

    // ------------------------------------------------------------------
    // Keyspace
    // ------------------------------------------------------------------

    /// Type of the value at `key`. Never fails.
    pub fn type_of(&self, key: &[u8]) -> KeyType {
        self.with_live(key, |value| value.map_or(KeyType::None, Value::key_type))
    }

    /// Deletes the given keys; returns how many existed.
    pub fn delete(&self, keys: &[Bytes]) -> usize {
        keys.iter()
            .filter(|key| {
                let mut data = self.shard(key).write();
                let expired = evict_if_expired(&mut data.entries, key);
                !expired && data.entries.remove(&key[..]).is_some()
            })
            .count()
    }

    /// Counts the given keys that exist. Repeated keys count repeatedly.
    pub fn exists(&self, keys: &[Bytes]) -> usize {
        keys.iter()
            .filter(|key| self.type_of(key) != KeyType::None)
            .count()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                let data = shard.read();
                data.entries.values().filter(|v| !v.is_expired()).count()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every key. Blocked clients stay blocked.
    pub fn flush(&self) {
        for shard in &self.shards {
            shard.write().entries.clear();
        }
    }
}
