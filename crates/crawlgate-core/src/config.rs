//! Configuration management

use crawlgate_common::{CrawlgateError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Coordination Defaults
// ============================================================================

/// Lock TTL in seconds. Bounds how long a crashed holder stalls waiters.
pub const DEFAULT_LOCK_TTL_SECS: u64 = 600;

/// Interval between lock attempts when the store cannot signal releases.
pub const DEFAULT_LOCK_POLL_MS: u64 = 1000;

/// Default maximum connections per pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Shared key-value store; `None` runs in single-instance mode
    pub store_url: Option<String>,
    /// Relational store for running-state bookkeeping
    pub database_url: Option<String>,
    /// Task identifier recorded in the running-state table
    pub task_id: Option<String>,
    pub lock: LockSettings,
    pub max_connections: u32,
}

/// Timing of distributed lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSettings {
    pub ttl_secs: u64,
    pub poll_interval_ms: u64,
}

impl LockSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_LOCK_TTL_SECS,
            poll_interval_ms: DEFAULT_LOCK_POLL_MS,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match non_empty_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| CrawlgateError::Configuration(format!("{} has an invalid value: {}", name, raw))),
        None => Ok(default),
    }
}

impl CoordinatorConfig {
    /// Load configuration from `.env`, the environment and defaults
    ///
    /// - `CRAWLGATE_STORE_URL`
    /// - `CRAWLGATE_DATABASE_URL`
    /// - `CRAWLGATE_TASK_ID`
    /// - `CRAWLGATE_LOCK_TTL_SECS`
    /// - `CRAWLGATE_LOCK_POLL_MS`
    /// - `CRAWLGATE_MAX_CONNECTIONS`
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = CoordinatorConfig {
            store_url: non_empty_var("CRAWLGATE_STORE_URL"),
            database_url: non_empty_var("CRAWLGATE_DATABASE_URL"),
            task_id: non_empty_var("CRAWLGATE_TASK_ID"),
            lock: LockSettings {
                ttl_secs: parsed_var("CRAWLGATE_LOCK_TTL_SECS", DEFAULT_LOCK_TTL_SECS)?,
                poll_interval_ms: parsed_var("CRAWLGATE_LOCK_POLL_MS", DEFAULT_LOCK_POLL_MS)?,
            },
            max_connections: parsed_var("CRAWLGATE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lock.ttl_secs == 0 {
            return Err(CrawlgateError::Configuration(
                "Lock TTL must be greater than 0".to_string(),
            ));
        }

        if self.lock.poll_interval_ms == 0 {
            return Err(CrawlgateError::Configuration(
                "Lock poll interval must be greater than 0".to_string(),
            ));
        }

        if self.lock.poll_interval() >= self.lock.ttl() {
            return Err(CrawlgateError::Configuration(format!(
                "Lock poll interval ({}ms) must be shorter than the lock TTL ({}s)",
                self.lock.poll_interval_ms, self.lock.ttl_secs
            )));
        }

        if self.max_connections == 0 {
            return Err(CrawlgateError::Configuration(
                "max_connections must be greater than 0".to_string(),
            ));
        }

        if self.store_url.is_none() {
            tracing::warn!("No shared store configured - running in single-instance mode");
        }

        Ok(())
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            database_url: None,
            task_id: None,
            lock: LockSettings::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}
