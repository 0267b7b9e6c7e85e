//! Distributed lock over the shared store
//!
//! A lock is named by `(namespace, key)` and held by an opaque holder token.
//! Each `DistributedLock` gets its own token, so one instance can never release
//! a lock another instance holds. The TTL is the only bound on a crashed
//! holder: waiters stall until it expires.

use crawlgate_common::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::config::LockSettings;
use crate::store::SharedStore;

/// Store key for a lock
pub fn lock_key(namespace: &str, key: &str) -> String {
    format!("crawlgate:{}-lock:{}", namespace, key)
}

#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn SharedStore>,
    holder: String,
    settings: LockSettings,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn SharedStore>, settings: LockSettings) -> Self {
        Self::with_holder(store, settings, Uuid::new_v4().to_string())
    }

    pub fn with_holder(
        store: Arc<dyn SharedStore>,
        settings: LockSettings,
        holder: impl Into<String>,
    ) -> Self {
        Self {
            store,
            holder: holder.into(),
            settings,
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn ttl(&self) -> Duration {
        self.settings.ttl()
    }

    /// Single non-blocking attempt
    pub async fn try_acquire(&self, namespace: &str, key: &str) -> Result<bool> {
        self.store
            .lock_take(&lock_key(namespace, key), &self.holder, self.settings.ttl())
            .await
    }

    /// Block until the lock is taken
    ///
    /// There is no deadline: contention resolves when the holder releases or
    /// its TTL runs out. Between attempts the store is asked to wake us on
    /// release, falling back to the poll interval.
    pub async fn acquire(&self, namespace: &str, key: &str) -> Result<()> {
        let store_key = lock_key(namespace, key);
        let started = Instant::now();
        let mut attempts: u64 = 0;

        loop {
            attempts += 1;
            if self
                .store
                .lock_take(&store_key, &self.holder, self.settings.ttl())
                .await?
            {
                break;
            }

            if attempts == 1 {
                debug!(
                    namespace = %namespace,
                    key = %key,
                    "Lock held by another instance, waiting"
                );
            }

            self.store
                .wait_for_release(&store_key, self.settings.poll_interval())
                .await;
        }

        debug!(
            namespace = %namespace,
            key = %key,
            attempts,
            waited_ms = started.elapsed().as_millis() as u64,
            "Lock acquired"
        );

        Ok(())
    }

    /// Release the lock; a no-op if it was already released or expired
    pub async fn release(&self, namespace: &str, key: &str) -> Result<()> {
        self.store
            .lock_release(&lock_key(namespace, key), &self.holder)
            .await
    }
}
