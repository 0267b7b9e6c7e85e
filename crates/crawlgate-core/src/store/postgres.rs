//! Postgres-backed shared store
//!
//! Locks are rows with an expiry; taking a lock is a single upsert that only
//! overwrites an expired row, so two instances can never both win. Status
//! hashes are a two-column key table. Pub/sub rides on `pg_notify` and
//! `LISTEN`.

use async_trait::async_trait;
use crawlgate_common::{CrawlgateError, Result};
use sha2::{Digest, Sha256};
use sqlx::postgres::{PgListener, PgPool, PgPoolOptions};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{SharedStore, Subscription};

/// Postgres channel for a topic
///
/// Channel names are identifiers capped at 63 bytes, while job identities may
/// be up to 120 characters, so topics are hashed.
pub fn channel_name(topic: &str) -> String {
    let digest = hex::encode(Sha256::digest(topic.as_bytes()));
    format!("crawlgate_{}", &digest[..16])
}

#[derive(Clone)]
pub struct PgSharedStore {
    pool: PgPool,
}

impl PgSharedStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect without touching the schema
    ///
    /// For callers that only read or write existing coordination state.
    pub async fn open(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await
            .map_err(CrawlgateError::store)?;

        Ok(Self::new(pool))
    }

    /// Connect and make sure the coordination tables exist
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let store = Self::open(url, max_connections).await?;
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Apply the coordination migrations
    ///
    /// The migrator holds a Postgres advisory lock while it runs, so any
    /// number of instances may call this against a fresh database at once.
    pub async fn ensure_schema(&self) -> Result<()> {
        let mut migrator = sqlx::migrate!("./migrations/store");
        migrator
            .set_ignore_missing(true)
            .run(&self.pool)
            .await
            .map_err(|e| CrawlgateError::store(format!("Migration failed: {}", e)))
    }
}

#[async_trait]
impl SharedStore for PgSharedStore {
    async fn lock_take(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let taken: Option<String> = sqlx::query_scalar(
            r#"
            INSERT INTO crawlgate_locks (lock_key, holder, expires_at)
            VALUES ($1, $2, NOW() + make_interval(secs => $3))
            ON CONFLICT (lock_key) DO UPDATE
            SET holder = EXCLUDED.holder, expires_at = EXCLUDED.expires_at
            WHERE crawlgate_locks.expires_at <= NOW()
            RETURNING holder
            "#,
        )
        .bind(key)
        .bind(holder)
        .bind(ttl.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(CrawlgateError::store)?;

        Ok(taken.is_some())
    }

    async fn lock_release(&self, key: &str, holder: &str) -> Result<()> {
        sqlx::query("DELETE FROM crawlgate_locks WHERE lock_key = $1 AND holder = $2")
            .bind(key)
            .bind(holder)
            .execute(&self.pool)
            .await
            .map_err(CrawlgateError::store)?;
        Ok(())
    }

    async fn hash_get(&self, map_key: &str, field: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM crawlgate_hash WHERE map_key = $1 AND field = $2")
            .bind(map_key)
            .bind(field)
            .fetch_optional(&self.pool)
            .await
            .map_err(CrawlgateError::store)
    }

    async fn hash_set(&self, map_key: &str, field: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO crawlgate_hash (map_key, field, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (map_key, field) DO UPDATE
            SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(map_key)
        .bind(field)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(CrawlgateError::store)?;
        Ok(())
    }

    async fn hash_delete(&self, map_key: &str, field: &str) -> Result<()> {
        sqlx::query("DELETE FROM crawlgate_hash WHERE map_key = $1 AND field = $2")
            .bind(map_key)
            .bind(field)
            .execute(&self.pool)
            .await
            .map_err(CrawlgateError::store)?;
        Ok(())
    }

    async fn publish(&self, topic: &str, message: &str) -> Result<()> {
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(channel_name(topic))
            .bind(message)
            .execute(&self.pool)
            .await
            .map_err(CrawlgateError::store)?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        let channel = channel_name(topic);
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(CrawlgateError::store)?;
        listener
            .listen(&channel)
            .await
            .map_err(CrawlgateError::store)?;

        debug!(topic = %topic, channel = %channel, "Listening for notifications");

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    received = listener.recv() => match received {
                        Ok(notification) => {
                            if tx.send(notification.payload().to_string()).is_err() {
                                break;
                            }
                        },
                        Err(e) => {
                            warn!(channel = %channel, error = %e, "Notification listener stopped");
                            break;
                        },
                    },
                }
            }
        });

        Ok(rx)
    }
}
