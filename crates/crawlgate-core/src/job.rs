//! Contracts a crawl job instance provides to the coordinators
//!
//! Fetching, extraction and persistence live behind these traits; the
//! coordinators only need lifecycle switches, the pending-request queue, and
//! the builders that seed it.

use async_trait::async_trait;
use crawlgate_common::{CrawlgateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::control::ControlReceiver;

/// Longest accepted job identity, in characters
pub const MAX_IDENTITY_LEN: usize = 120;

/// Identity shared by every instance of one logical distributed run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobIdentity(String);

impl JobIdentity {
    pub fn new(identity: impl Into<String>) -> Result<Self> {
        let identity = identity.into();
        let len = identity.chars().count();
        if len == 0 || len > MAX_IDENTITY_LEN {
            return Err(CrawlgateError::Configuration(format!(
                "Length of job identity should be between 1 and {} characters, got {}",
                MAX_IDENTITY_LEN, len
            )));
        }
        Ok(Self(identity))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobIdentity {
    type Error = CrawlgateError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<JobIdentity> for String {
    fn from(identity: JobIdentity) -> Self {
        identity.0
    }
}

impl std::fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Initial unit of work enqueued before extraction begins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

impl StartRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extras: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }
}

/// Lifecycle switches of a local job instance
///
/// Implementations only flip instance-local state; they are called from the
/// job's own run loop when it drains control commands.
pub trait JobLifecycle: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    fn run_async(&self);
    fn exit(&self);
}

/// The job's queue of pending requests
#[async_trait]
pub trait RequestQueue: Send + Sync {
    async fn init(&self, identity: &JobIdentity) -> anyhow::Result<()>;

    /// Drop every pending request
    async fn clean(&self) -> anyhow::Result<()>;

    async fn dispose(&self) -> anyhow::Result<()>;

    async fn push(&self, request: StartRequest) -> anyhow::Result<()>;
}

/// Produces start requests into the queue
#[async_trait]
pub trait StartRequestBuilder: Send + Sync {
    fn name(&self) -> &str;

    /// Push start requests, returning how many were enqueued
    async fn build(&self, queue: &dyn RequestQueue) -> anyhow::Result<usize>;
}

/// Builder over a fixed list of requests
pub struct StaticStartRequests {
    name: String,
    requests: Vec<StartRequest>,
}

impl StaticStartRequests {
    pub fn new(name: impl Into<String>, requests: Vec<StartRequest>) -> Self {
        Self {
            name: name.into(),
            requests,
        }
    }

    pub fn from_urls<I, S>(name: impl Into<String>, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, urls.into_iter().map(StartRequest::new).collect())
    }
}

#[async_trait]
impl StartRequestBuilder for StaticStartRequests {
    fn name(&self) -> &str {
        &self.name
    }

    async fn build(&self, queue: &dyn RequestQueue) -> anyhow::Result<usize> {
        for request in &self.requests {
            queue.push(request.clone()).await?;
        }
        Ok(self.requests.len())
    }
}

/// A crawl job as driven by [`crate::runner::JobRunner`]
#[async_trait]
pub trait CrawlJob: JobLifecycle {
    fn identity(&self) -> &JobIdentity;

    fn name(&self) -> &str;

    fn request_queue(&self) -> &dyn RequestQueue;

    /// Run the crawl loop, applying pending control commands between steps
    async fn crawl(&self, control: &mut ControlReceiver) -> anyhow::Result<()>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_bounds() {
        assert!(JobIdentity::new("news-crawl").is_ok());
        assert!(JobIdentity::new("x".repeat(120)).is_ok());
        assert!(matches!(
            JobIdentity::new("x".repeat(121)),
            Err(CrawlgateError::Configuration(_))
        ));
        assert!(JobIdentity::new("").is_err());
        // Only the character count matters
        assert!(JobIdentity::new("   ").is_ok());
        assert!(JobIdentity::new("x").is_ok());
    }

    #[test]
    fn test_identity_counts_characters_not_bytes() {
        // 120 three-byte characters
        assert!(JobIdentity::new("抓".repeat(120)).is_ok());
    }

    #[test]
    fn test_identity_deserialize_validates() {
        let ok: JobIdentity = serde_json::from_str("\"orders\"").unwrap();
        assert_eq!(ok.as_str(), "orders");
        assert!(serde_json::from_str::<JobIdentity>("\"\"").is_err());
    }
}
