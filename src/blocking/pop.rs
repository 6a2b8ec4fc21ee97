//! The suspended half of a blocking pop.

use crate::blocking::queue::Delivery;
use crate::storage::StorageEngine;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A registered, not yet resolved blocking pop.
///
/// Created by [`StorageEngine::pop_or_wait`] when the list was empty. The
/// registration is resolved exactly once, by whichever happens first:
///
/// - a push hands this waiter a value ([`wait`](Self::wait) returns it),
/// - the timeout fires (`wait` returns `None`),
/// - the handle is dropped unresolved, e.g. because the client disconnected.
///   The registration is withdrawn and a value that was already handed over
///   goes back to the head of the list.
#[derive(Debug)]
pub struct BlockingPop {
    engine: Arc<StorageEngine>,
    key: Bytes,
    id: u64,
    timeout: Option<Duration>,
    receiver: oneshot::Receiver<Delivery>,
    resolved: bool,
}

impl BlockingPop {
    pub(crate) fn new(
        engine: Arc<StorageEngine>,
        key: Bytes,
        id: u64,
        timeout: Option<Duration>,
        receiver: oneshot::Receiver<Delivery>,
    ) -> Self {
        Self {
            engine,
            key,
            id,
            timeout,
            receiver,
            resolved: false,
        }
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Waits for a value or for the timeout.
    pub async fn wait(mut self) -> Option<Delivery> {
        let outcome = match self.timeout {
            None => (&mut self.receiver).await.ok(),
            Some(limit) => match tokio::time::timeout(limit, &mut self.receiver).await {
                Ok(received) => received.ok(),
                Err(_) => self.expire(),
            },
        };

        self.resolved = true;
        outcome
    }

    /// Timer fired. Withdraw the registration unless a push got there first.
    fn expire(&mut self) -> Option<Delivery> {
        if self.engine.cancel_wait(&self.key, self.id) {
            debug!(key = ?self.key, waiter = self.id, "Blocking pop timed out");
            return None;
        }

        // Delivery and cancellation both run under the shard lock, so a
        // waiter that is no longer queued already has its value.
        self.receiver.try_recv().ok()
    }
}

impl Drop for BlockingPop {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }

        if self.engine.cancel_wait(&self.key, self.id) {
            debug!(key = ?self.key, waiter = self.id, "Blocking pop abandoned");
            return;
        }

        if let Ok((key, value)) = self.receiver.try_recv() {
            if !self.engine.requeue_front(key, value) {
                warn!(
                    key = ?self.key,
                    "Undelivered value dropped: key no longer holds a list"
                );
            }
        }
    }
}
