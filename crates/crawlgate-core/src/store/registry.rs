//! Connection registry
//!
//! Construct-or-reuse cache of Postgres pools and shared stores, keyed by
//! connection string. The job runner owns one registry and hands references
//! to it down to whatever needs a connection, so every coordinator in the
//! process shares the same pools for as long as the runner lives.

use crawlgate_common::{CrawlgateError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use super::PgSharedStore;

pub struct ConnectionRegistry {
    max_connections: u32,
    pools: Mutex<HashMap<String, PgPool>>,
    stores: Mutex<HashMap<String, Arc<PgSharedStore>>>,
}

impl ConnectionRegistry {
    pub fn new(max_connections: u32) -> Self {
        Self {
            max_connections,
            pools: Mutex::new(HashMap::new()),
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Pool for `url`, connecting on first use
    pub async fn pool(&self, url: &str) -> Result<PgPool> {
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(url) {
            return Ok(pool.clone());
        }

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await
            .map_err(CrawlgateError::database)?;

        info!(max_connections = self.max_connections, "Opened database pool");
        pools.insert(url.to_string(), pool.clone());
        Ok(pool)
    }

    /// Shared store over the pool for `url`, creating its tables on first use
    pub async fn shared_store(&self, url: &str) -> Result<Arc<PgSharedStore>> {
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(url) {
            return Ok(store.clone());
        }

        let store = Arc::new(PgSharedStore::new(self.pool(url).await?));
        store.ensure_schema().await?;
        stores.insert(url.to_string(), store.clone());
        Ok(store)
    }

    pub async fn pool_count(&self) -> usize {
        self.pools.lock().await.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_CONNECTIONS)
    }
}
