//! Shared key-value store used for cross-instance coordination
//!
//! All instances of one job coordinate only through this store: TTL-bounded
//! locks, a small status hash, and a broadcast topic per job identity.
//!
//! Two backends are provided:
//! - [`PgSharedStore`]: Postgres tables plus `LISTEN`/`NOTIFY`
//! - [`MemoryStore`]: process-local, for single-process clusters and tests

pub mod memory;
pub mod postgres;
pub mod registry;

use async_trait::async_trait;
use crawlgate_common::Result;
use std::time::Duration;
use tokio::sync::mpsc;

pub use memory::MemoryStore;
pub use postgres::PgSharedStore;
pub use registry::ConnectionRegistry;

/// Stream of message bodies published on one topic
pub type Subscription = mpsc::UnboundedReceiver<String>;

/// Capabilities the coordinators need from the shared store
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Take `key` for `holder` unless a live lock exists. Never blocks.
    async fn lock_take(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool>;

    /// Release `key` if `holder` still owns it. Releasing a lock that has
    /// expired or belongs to someone else is a no-op.
    async fn lock_release(&self, key: &str, holder: &str) -> Result<()>;

    async fn hash_get(&self, map_key: &str, field: &str) -> Result<Option<String>>;

    async fn hash_set(&self, map_key: &str, field: &str, value: &str) -> Result<()>;

    async fn hash_delete(&self, map_key: &str, field: &str) -> Result<()>;

    async fn publish(&self, topic: &str, message: &str) -> Result<()>;

    /// Subscribe to `topic`. Delivery is best-effort and unordered; the
    /// subscription ends when the receiver is dropped.
    async fn subscribe(&self, topic: &str) -> Result<Subscription>;

    /// Wait until `key` may have become free, at most `max_wait`.
    ///
    /// Backends without release notifications just sleep.
    async fn wait_for_release(&self, _key: &str, max_wait: Duration) {
        tokio::time::sleep(max_wait).await;
    }
}
