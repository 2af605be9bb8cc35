//! Bulletin-board abstraction (spec.md §5): the single suspension point
//! every party's protocol step publishes to and waits on. Only the
//! interface is in scope per spec.md §1 ("the bulletin-board transport
//! proper" is a Non-goal); this module supplies the trait plus an
//! in-memory implementation for tests and the single-process demo binary.
//!
//! Grounded on `dashmap`-backed in-memory stores used by a
//! coordinator/session-state layer, combined with `tokio::sync::Notify`
//! for the per-key suspension semantics `waitFor` needs.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

const LOG_TARGET: &str = "mixnet_engine::bulletin";

/// A single publication slot, keyed by `(sid, auxsid, label)` in spec.md
/// §5's scheme; this crate keys by an already-formatted `String` and
/// leaves composition of that key to the caller.
#[async_trait]
pub trait BulletinBoard: Send + Sync {
    /// Publish `value` under `key`. Per spec.md §5, a party publishes to
    /// its own key at most once per session; a second publish to the same
    /// key is a caller error surfaced as `Err`, not silently overwritten.
    async fn publish(&self, key: &str, value: Vec<u8>) -> Result<(), String>;

    /// Suspend until `key` has been published, then return its bytes.
    /// Never times out on its own; callers needing a deadline wrap this in
    /// `tokio::time::timeout`.
    async fn wait_for(&self, key: &str) -> Vec<u8>;

    /// Non-blocking check: `Some` if `key` is already published.
    fn peek(&self, key: &str) -> Option<Vec<u8>>;
}

struct Slot {
    value: Mutex<Option<Vec<u8>>>,
    notify: Notify,
}

/// An in-memory [`BulletinBoard`] backed by a concurrent map, used by
/// tests, `tests/end_to_end.rs`, and `bin/mix_server.rs`'s single-process
/// demo session. Not durable and not networked; a production deployment
/// swaps this for a real transport behind the same trait.
#[derive(Default)]
pub struct InMemoryBulletinBoard {
    slots: DashMap<String, Arc<Slot>>,
}

impl InMemoryBulletinBoard {
    pub fn new() -> Self {
        Self { slots: DashMap::new() }
    }

    fn slot_for(&self, key: &str) -> Arc<Slot> {
        self.slots
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(Slot {
                    value: Mutex::new(None),
                    notify: Notify::new(),
                })
            })
            .clone()
    }

    /// Snapshot every currently-published key, for proof-directory
    /// assembly once a session has run to completion.
    pub fn snapshot(&self) -> HashMap<String, Vec<u8>> {
        self.slots
            .iter()
            .filter_map(|entry| entry.value().value.lock().clone().map(|v| (entry.key().clone(), v)))
            .collect()
    }
}

#[async_trait]
impl BulletinBoard for InMemoryBulletinBoard {
    async fn publish(&self, key: &str, value: Vec<u8>) -> Result<(), String> {
        let slot = self.slot_for(key);
        let mut guard = slot.value.lock();
        if guard.is_some() {
            return Err(format!("key '{key}' already published"));
        }
        *guard = Some(value);
        drop(guard);
        slot.notify.notify_waiters();
        tracing::trace!(target: LOG_TARGET, key, "published");
        Ok(())
    }

    async fn wait_for(&self, key: &str) -> Vec<u8> {
        let slot = self.slot_for(key);
        loop {
            // Register interest before checking the value: `notify_waiters`
            // only wakes tasks already waiting on a `Notified` future, so
            // checking first would let a publish land in the gap between
            // the check and the `.notified()` call and be missed forever.
            let notified = slot.notify.notified();
            if let Some(v) = slot.value.lock().clone() {
                return v;
            }
            notified.await;
        }
    }

    fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.slots.get(key).and_then(|entry| entry.value().value.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_wait_for_returns_value() {
        let board = InMemoryBulletinBoard::new();
        board.publish("party1/precomp", vec![1, 2, 3]).await.unwrap();
        assert_eq!(board.wait_for("party1/precomp").await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn wait_for_suspends_until_published() {
        let board = Arc::new(InMemoryBulletinBoard::new());
        let waiter_board = board.clone();
        let handle = tokio::spawn(async move { waiter_board.wait_for("late-key").await });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        board.publish("late-key", vec![9]).await.unwrap();
        assert_eq!(handle.await.unwrap(), vec![9]);
    }

    #[tokio::test]
    async fn wait_for_does_not_miss_a_concurrent_publish() {
        // No sleep before publish: the waiter's value-check and the
        // publisher's write race on the scheduler, tightening the window a
        // check-then-notified ordering bug would need to land in.
        let board = Arc::new(InMemoryBulletinBoard::new());
        let waiter_board = board.clone();
        let handle = tokio::spawn(async move { waiter_board.wait_for("racy-key").await });
        board.publish("racy-key", vec![7]).await.unwrap();
        assert_eq!(handle.await.unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn double_publish_is_rejected() {
        let board = InMemoryBulletinBoard::new();
        board.publish("k", vec![1]).await.unwrap();
        assert!(board.publish("k", vec![2]).await.is_err());
    }

    #[test]
    fn peek_is_none_before_publish() {
        let board = InMemoryBulletinBoard::new();
        assert_eq!(board.peek("absent"), None);
    }
}
