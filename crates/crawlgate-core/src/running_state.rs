//! Bookkeeping of running jobs in a relational store
//!
//! One row per task, written when a job starts and removed when it ends
//! cleanly. Rows of crashed jobs stay behind until the identity finishes a
//! later run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crawlgate_common::{CrawlgateError, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::job::JobIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningStateRecord {
    pub task_id: String,
    pub job_name: String,
    pub identity: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait RunningStateStore: Send + Sync {
    /// Create the bookkeeping table if missing; safe to race with other instances
    async fn ensure_schema(&self) -> Result<()>;

    /// Insert `record`, doing nothing if its task id is already present
    ///
    /// Returns whether a row was written.
    async fn insert_if_absent(&self, record: &RunningStateRecord) -> Result<bool>;

    /// Delete every row of `identity`, returning how many were removed
    async fn delete_by_identity(&self, identity: &str) -> Result<u64>;
}

pub struct PgRunningStateStore {
    pool: PgPool,
}

impl PgRunningStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All rows, oldest first
    pub async fn list(&self) -> Result<Vec<RunningStateRecord>> {
        let rows: Vec<(String, Option<String>, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT task_id, name, identity, cdate FROM crawlgate.task_running ORDER BY cdate",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(CrawlgateError::database)?;

        Ok(rows
            .into_iter()
            .map(|(task_id, name, identity, created_at)| RunningStateRecord {
                task_id,
                job_name: name.unwrap_or_default(),
                identity,
                created_at,
            })
            .collect())
    }
}

#[async_trait]
impl RunningStateStore for PgRunningStateStore {
    async fn ensure_schema(&self) -> Result<()> {
        // Shares `_sqlx_migrations` with the shared-store migrations when both
        // live in one database
        let mut migrator = sqlx::migrate!("./migrations/running_state");
        migrator
            .set_ignore_missing(true)
            .run(&self.pool)
            .await
            .map_err(|e| CrawlgateError::database(format!("Migration failed: {}", e)))
    }

    async fn insert_if_absent(&self, record: &RunningStateRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO crawlgate.task_running (task_id, name, identity, cdate)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (task_id) DO NOTHING
            "#,
        )
        .bind(&record.task_id)
        .bind(&record.job_name)
        .bind(&record.identity)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(CrawlgateError::database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_identity(&self, identity: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM crawlgate.task_running WHERE identity = $1")
            .bind(identity)
            .execute(&self.pool)
            .await
            .map_err(CrawlgateError::database)?;

        Ok(result.rows_affected())
    }
}

/// Process-local running-state table
#[derive(Default)]
pub struct MemoryRunningStateStore {
    rows: Mutex<Vec<RunningStateRecord>>,
}

impl MemoryRunningStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RunningStateRecord> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl RunningStateStore for MemoryRunningStateStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_if_absent(&self, record: &RunningStateRecord) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        if rows.iter().any(|row| row.task_id == record.task_id) {
            return Ok(false);
        }
        rows.push(record.clone());
        Ok(true)
    }

    async fn delete_by_identity(&self, identity: &str) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let before = rows.len();
        rows.retain(|row| row.identity != identity);
        Ok((before - rows.len()) as u64)
    }
}

/// Records which jobs are running
///
/// Both operations are no-ops unless a store and a task id are configured.
/// Store failures are returned to the caller.
pub struct RunningStateRegistry {
    store: Option<Arc<dyn RunningStateStore>>,
    task_id: Option<String>,
}

impl RunningStateRegistry {
    pub fn new(store: Option<Arc<dyn RunningStateStore>>, task_id: Option<String>) -> Self {
        Self { store, task_id }
    }

    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some() && self.task_id.is_some()
    }

    pub async fn register(&self, job_name: &str, identity: &JobIdentity) -> Result<()> {
        let (Some(store), Some(task_id)) = (&self.store, &self.task_id) else {
            debug!(identity = %identity, "Running-state bookkeeping not configured");
            return Ok(());
        };

        store.ensure_schema().await?;

        let record = RunningStateRecord {
            task_id: task_id.clone(),
            job_name: job_name.to_string(),
            identity: identity.to_string(),
            created_at: Utc::now(),
        };
        let inserted = store.insert_if_absent(&record).await?;

        info!(
            task_id = %task_id,
            identity = %identity,
            inserted,
            "Job registered as running"
        );
        Ok(())
    }

    pub async fn unregister(&self, identity: &JobIdentity) -> Result<()> {
        let (Some(store), Some(_)) = (&self.store, &self.task_id) else {
            return Ok(());
        };

        let removed = store.delete_by_identity(identity.as_str()).await?;
        info!(identity = %identity, removed, "Job removed from running state");
        Ok(())
    }
}
