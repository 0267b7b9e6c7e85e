//! Shared fixtures for crawlgate-core integration tests
//!
//! [`TestJob`] stands in for a crawl job: its queue is an in-memory list that
//! several instances can share, and its crawl loop only drains control
//! commands. Several [`JobRunner`]s sharing one [`MemoryStore`] behave like
//! separate processes sharing a store.

#![allow(dead_code)]

use async_trait::async_trait;
use crawlgate_common::Result as CrawlgateResult;
use crawlgate_core::config::LockSettings;
use crawlgate_core::control::ControlReceiver;
use crawlgate_core::coordination::DataVerifier;
use crawlgate_core::job::{
    CrawlJob, JobIdentity, JobLifecycle, RequestQueue, StartRequest, StartRequestBuilder,
};
use crawlgate_core::running_state::{MemoryRunningStateStore, RunningStateRegistry, RunningStateStore};
use crawlgate_core::runner::JobRunner;
use crawlgate_core::schema::{ExtractionRule, PropertyDescriptor, PropertyType, Selector, TypeDescriptor};
use crawlgate_core::store::{MemoryStore, SharedStore, Subscription};
use crawlgate_core::SchemaGenerator;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Lock timing short enough for tests that contend
pub fn fast_locks() -> LockSettings {
    LockSettings {
        ttl_secs: 30,
        poll_interval_ms: 20,
    }
}

pub fn identity(value: &str) -> JobIdentity {
    JobIdentity::new(value).unwrap()
}

pub fn article_descriptor() -> TypeDescriptor {
    TypeDescriptor::builder("Article")
        .root_selector(Selector::xpath("//div[@class='article']"))
        .property(
            PropertyDescriptor::new("title", PropertyType::String)
                .extract(ExtractionRule::new(Selector::xpath(".//h1")).length(200)),
        )
        .property(
            PropertyDescriptor::new("views", PropertyType::Int64)
                .extract(ExtractionRule::new(Selector::css(".views"))),
        )
        .build()
}

/// Runner over `store` with one entity and the given start requests
pub fn runner(
    store: &Arc<MemoryStore>,
    running_state: &Arc<MemoryRunningStateStore>,
    task_id: &str,
    builder: Arc<dyn StartRequestBuilder>,
) -> JobRunner {
    let shared: Arc<dyn SharedStore> = store.clone();
    let bookkeeping: Arc<dyn RunningStateStore> = running_state.clone();
    let descriptor = article_descriptor();
    JobRunner::new(
        Some(shared),
        RunningStateRegistry::new(Some(bookkeeping), Some(task_id.to_string())),
        fast_locks(),
    )
    .with_schema(&SchemaGenerator::default(), [&descriptor])
    .unwrap()
    .with_start_requests(builder)
}

/// Pending-request queue shared by every instance of a test job
#[derive(Default)]
pub struct MemoryQueue {
    requests: Mutex<Vec<StartRequest>>,
    pub inits: AtomicUsize,
    pub cleans: AtomicUsize,
    pub disposals: AtomicUsize,
}

impl MemoryQueue {
    pub fn urls(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|r| r.url.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<StartRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestQueue for MemoryQueue {
    async fn init(&self, _identity: &JobIdentity) -> anyhow::Result<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clean(&self) -> anyhow::Result<()> {
        self.cleans.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().clear();
        Ok(())
    }

    async fn dispose(&self) -> anyhow::Result<()> {
        self.disposals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn push(&self, request: StartRequest) -> anyhow::Result<()> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}

pub fn seeding(builder: &Arc<CountingBuilder>) -> Vec<Arc<dyn StartRequestBuilder>> {
    vec![builder.clone() as Arc<dyn StartRequestBuilder>]
}

/// Start-request builder that counts how often it ran
pub struct CountingBuilder {
    urls: Vec<String>,
    delay: Duration,
    pub runs: AtomicUsize,
}

impl CountingBuilder {
    pub fn new(urls: &[&str]) -> Self {
        Self {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            delay: Duration::ZERO,
            runs: AtomicUsize::new(0),
        }
    }

    /// Hold the init lock a while so other instances pile up behind it
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StartRequestBuilder for CountingBuilder {
    fn name(&self) -> &str {
        "counting"
    }

    async fn build(&self, queue: &dyn RequestQueue) -> anyhow::Result<usize> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        for url in &self.urls {
            queue.push(StartRequest::new(url.clone())).await?;
        }
        Ok(self.urls.len())
    }
}

/// Verifier that counts its calls and optionally fails
pub struct CountingVerifier {
    fail: bool,
    pub calls: AtomicUsize,
}

impl CountingVerifier {
    pub fn passing() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataVerifier for CountingVerifier {
    async fn verify(&self, _identity: &JobIdentity) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("expected at least 10 rows, found 3");
        }
        Ok(())
    }
}

/// How a [`TestJob`] crawl behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    /// Return right away
    Immediate,
    /// Apply control commands until EXIT arrives
    UntilExit,
    Fail,
}

pub struct TestJob {
    identity: JobIdentity,
    queue: Arc<MemoryQueue>,
    mode: CrawlMode,
    paused: AtomicBool,
    exited: AtomicBool,
    pub applied: Mutex<Vec<&'static str>>,
}

impl TestJob {
    pub fn new(identity: &str, queue: Arc<MemoryQueue>, mode: CrawlMode) -> Self {
        Self {
            identity: JobIdentity::new(identity).unwrap(),
            queue,
            mode,
            paused: AtomicBool::new(false),
            exited: AtomicBool::new(false),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn applied(&self) -> Vec<&'static str> {
        self.applied.lock().unwrap().clone()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

impl JobLifecycle for TestJob {
    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        self.applied.lock().unwrap().push("pause");
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.applied.lock().unwrap().push("resume");
    }

    fn run_async(&self) {
        self.applied.lock().unwrap().push("run_async");
    }

    fn exit(&self) {
        self.exited.store(true, Ordering::SeqCst);
        self.applied.lock().unwrap().push("exit");
    }
}

#[async_trait]
impl CrawlJob for TestJob {
    fn identity(&self) -> &JobIdentity {
        &self.identity
    }

    fn name(&self) -> &str {
        "test-job"
    }

    fn request_queue(&self) -> &dyn RequestQueue {
        self.queue.as_ref()
    }

    async fn crawl(&self, control: &mut ControlReceiver) -> anyhow::Result<()> {
        match self.mode {
            CrawlMode::Immediate => Ok(()),
            CrawlMode::Fail => anyhow::bail!("downloader gave up"),
            CrawlMode::UntilExit => {
                let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
                while !self.has_exited() {
                    control.apply_pending(self);
                    if tokio::time::Instant::now() > deadline {
                        anyhow::bail!("no EXIT command received");
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                Ok(())
            },
        }
    }
}

/// Wait until the control topic of `identity` has `count` subscribers
pub async fn wait_for_subscribers(store: &MemoryStore, identity: &str, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.subscriber_count(identity) < count {
        assert!(tokio::time::Instant::now() < deadline, "subscribers never appeared");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Store whose pub/sub is unavailable; everything else is a [`MemoryStore`]
#[derive(Default)]
pub struct NoPubSubStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl SharedStore for NoPubSubStore {
    async fn lock_take(&self, key: &str, holder: &str, ttl: Duration) -> CrawlgateResult<bool> {
        self.inner.lock_take(key, holder, ttl).await
    }

    async fn lock_release(&self, key: &str, holder: &str) -> CrawlgateResult<()> {
        self.inner.lock_release(key, holder).await
    }

    async fn hash_get(&self, map_key: &str, field: &str) -> CrawlgateResult<Option<String>> {
        self.inner.hash_get(map_key, field).await
    }

    async fn hash_set(&self, map_key: &str, field: &str, value: &str) -> CrawlgateResult<()> {
        self.inner.hash_set(map_key, field, value).await
    }

    async fn hash_delete(&self, map_key: &str, field: &str) -> CrawlgateResult<()> {
        self.inner.hash_delete(map_key, field).await
    }

    async fn publish(&self, _topic: &str, _message: &str) -> CrawlgateResult<()> {
        Err(crawlgate_common::CrawlgateError::store("pub/sub disabled"))
    }

    async fn subscribe(&self, _topic: &str) -> CrawlgateResult<Subscription> {
        Err(crawlgate_common::CrawlgateError::store("pub/sub disabled"))
    }
}
