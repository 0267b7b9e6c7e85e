//! In-process shared store
//!
//! Several job instances in one process can share a `MemoryStore` through an
//! `Arc`; they then coordinate exactly as separate processes would through
//! Postgres. Lock waiters are woken on release instead of polling.

use async_trait::async_trait;
use crawlgate_common::Result;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;

use super::{SharedStore, Subscription};

#[derive(Debug)]
struct LockEntry {
    holder: String,
    expires_at: Instant,
}

#[derive(Default)]
struct MemoryState {
    locks: HashMap<String, LockEntry>,
    hashes: HashMap<String, HashMap<String, String>>,
    topics: HashMap<String, Vec<mpsc::UnboundedSender<String>>>,
}

impl MemoryState {
    /// Drop closed subscriptions and topics nobody listens on any more
    fn prune_closed(&mut self) {
        self.topics.retain(|_, senders| {
            senders.retain(|tx| !tx.is_closed());
            !senders.is_empty()
        });
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    released: Notify,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current live holder of `key`, if any
    pub fn lock_holder(&self, key: &str) -> Option<String> {
        let state = self.state();
        state
            .locks
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.holder.clone())
    }

    /// Number of open subscriptions on `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let state = self.state();
        state
            .topics
            .get(topic)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Number of topics with at least one registered subscription
    pub fn topic_count(&self) -> usize {
        self.state().topics.len()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn lock_take(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut state = self.state();

        if let Some(existing) = state.locks.get(key) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }

        state.locks.insert(
            key.to_string(),
            LockEntry {
                holder: holder.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn lock_release(&self, key: &str, holder: &str) -> Result<()> {
        let removed = {
            let mut state = self.state();
            match state.locks.get(key) {
                Some(entry) if entry.holder == holder => state.locks.remove(key).is_some(),
                _ => false,
            }
        };

        if removed {
            self.released.notify_waiters();
        }
        Ok(())
    }

    async fn hash_get(&self, map_key: &str, field: &str) -> Result<Option<String>> {
        let state = self.state();
        Ok(state
            .hashes
            .get(map_key)
            .and_then(|fields| fields.get(field))
            .cloned())
    }

    async fn hash_set(&self, map_key: &str, field: &str, value: &str) -> Result<()> {
        let mut state = self.state();
        state
            .hashes
            .entry(map_key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_delete(&self, map_key: &str, field: &str) -> Result<()> {
        let mut state = self.state();
        if let Some(fields) = state.hashes.get_mut(map_key) {
            fields.remove(field);
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, message: &str) -> Result<()> {
        let mut state = self.state();
        if let Some(senders) = state.topics.get_mut(topic) {
            senders.retain(|tx| tx.send(message.to_string()).is_ok());
        }
        state.prune_closed();
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();
        state.prune_closed();
        state.topics.entry(topic.to_string()).or_default().push(tx);
        Ok(rx)
    }

    async fn wait_for_release(&self, _key: &str, max_wait: Duration) {
        let _ = tokio::time::timeout(max_wait, self.released.notified()).await;
    }
}
