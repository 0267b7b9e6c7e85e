//! Run a phase at most once per job identity
//!
//! Every instance of a job calls [`StatusGate::run_once`] for the same phase.
//! Under the phase lock each instance reads the phase's status marker: the
//! first one to find it missing runs the work and writes the marker, the rest
//! skip. Failed work leaves the marker unwritten so a later instance retries.
//!
//! Without a shared store the gate runs the work locally every time.

use crawlgate_common::{CrawlgateError, Result};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

use super::lock::DistributedLock;
use crate::config::LockSettings;
use crate::store::SharedStore;

/// A gated phase: its lock namespace and the marker written on completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub namespace: String,
    pub marker: String,
}

impl Phase {
    pub fn new(namespace: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            marker: marker.into(),
        }
    }

    pub fn init() -> Self {
        Self::new("init", "init finished")
    }

    pub fn verify() -> Self {
        Self::new("verify", "verify finished")
    }

    /// Store key of the identity -> marker hash for this phase
    pub fn status_key(&self) -> String {
        format!("crawlgate:{}-status", self.namespace)
    }
}

/// What happened to the work passed to the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome<T> {
    Ran(T),
    /// Another instance already completed the phase
    Skipped,
}

impl<T> GateOutcome<T> {
    pub fn ran(&self) -> bool {
        matches!(self, GateOutcome::Ran(_))
    }
}

#[derive(Clone)]
struct SharedGate {
    store: Arc<dyn SharedStore>,
    lock: DistributedLock,
}

#[derive(Clone)]
pub struct StatusGate {
    shared: Option<SharedGate>,
}

impl StatusGate {
    pub fn new(store: Option<Arc<dyn SharedStore>>, settings: LockSettings) -> Self {
        Self {
            shared: store.map(|store| SharedGate {
                lock: DistributedLock::new(store.clone(), settings),
                store,
            }),
        }
    }

    /// Gate without cross-instance exclusion
    pub fn local() -> Self {
        Self { shared: None }
    }

    pub fn is_distributed(&self) -> bool {
        self.shared.is_some()
    }

    /// Current marker for `identity`, `None` in single-instance mode
    pub async fn status(&self, identity: &str, phase: &Phase) -> Result<Option<String>> {
        match &self.shared {
            Some(shared) => shared.store.hash_get(&phase.status_key(), identity).await,
            None => Ok(None),
        }
    }

    pub async fn is_complete(&self, identity: &str, phase: &Phase) -> Result<bool> {
        Ok(self.status(identity, phase).await?.as_deref() == Some(phase.marker.as_str()))
    }

    /// Forget that `phase` finished for `identity`
    pub async fn clear(&self, identity: &str, phase: &Phase) -> Result<()> {
        match &self.shared {
            Some(shared) => shared.store.hash_delete(&phase.status_key(), identity).await,
            None => Ok(()),
        }
    }

    /// Run `work` unless some instance already completed `phase`
    pub async fn run_once<F, Fut, T>(
        &self,
        identity: &str,
        phase: &Phase,
        work: F,
    ) -> Result<GateOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.run(identity, phase, None::<fn() -> futures::future::Ready<anyhow::Result<()>>>, work)
            .await
    }

    /// Run `work` regardless of the marker, calling `reset` first
    ///
    /// `reset` and the marker removal happen under the phase lock, so
    /// instances gated normally at the same time observe either the old
    /// completion or the rerun, never a half-reset state.
    pub async fn rerun<R, RFut, F, Fut, T>(
        &self,
        identity: &str,
        phase: &Phase,
        reset: R,
        work: F,
    ) -> Result<GateOutcome<T>>
    where
        R: FnOnce() -> RFut,
        RFut: Future<Output = anyhow::Result<()>>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.run(identity, phase, Some(reset), work).await
    }

    async fn run<R, RFut, F, Fut, T>(
        &self,
        identity: &str,
        phase: &Phase,
        reset: Option<R>,
        work: F,
    ) -> Result<GateOutcome<T>>
    where
        R: FnOnce() -> RFut,
        RFut: Future<Output = anyhow::Result<()>>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let span = info_span!("status_gate", identity = %identity, phase = %phase.namespace);

        async move {
            let Some(shared) = &self.shared else {
                if let Some(reset) = reset {
                    reset().await.map_err(CrawlgateError::Work)?;
                }
                let value = work().await.map_err(CrawlgateError::Work)?;
                return Ok(GateOutcome::Ran(value));
            };

            shared.lock.acquire(&phase.namespace, identity).await?;

            let result = AssertUnwindSafe(Self::run_locked(shared, identity, phase, reset, work))
                .catch_unwind()
                .await;

            if let Err(e) = shared.lock.release(&phase.namespace, identity).await {
                warn!(error = %e, "Failed to release phase lock, it will expire with its TTL");
            }

            match result {
                Ok(outcome) => outcome,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        .instrument(span)
        .await
    }

    async fn run_locked<R, RFut, F, Fut, T>(
        shared: &SharedGate,
        identity: &str,
        phase: &Phase,
        reset: Option<R>,
        work: F,
    ) -> Result<GateOutcome<T>>
    where
        R: FnOnce() -> RFut,
        RFut: Future<Output = anyhow::Result<()>>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let status_key = phase.status_key();

        match reset {
            Some(reset) => {
                reset().await.map_err(CrawlgateError::Work)?;
                shared.store.hash_delete(&status_key, identity).await?;
                info!("Phase reset, running again");
            },
            None => {
                let current = shared.store.hash_get(&status_key, identity).await?;
                if current.as_deref() == Some(phase.marker.as_str()) {
                    info!("Phase already finished by another instance, skipping");
                    return Ok(GateOutcome::Skipped);
                }
            },
        }

        let value = work().await.map_err(CrawlgateError::Work)?;
        shared.store.hash_set(&status_key, identity, &phase.marker).await?;
        info!("Phase finished");

        Ok(GateOutcome::Ran(value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::coordination::lock::lock_key;
    use crate::store::MemoryStore;

    fn gate(store: &Arc<MemoryStore>) -> StatusGate {
        let store: Arc<dyn SharedStore> = store.clone();
        StatusGate::new(Some(store), LockSettings::default())
    }

    #[tokio::test]
    async fn test_second_run_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let gate = gate(&store);
        let phase = Phase::init();

        let first = gate.run_once("job", &phase, || async { Ok(1) }).await.unwrap();
        let second = gate.run_once("job", &phase, || async { Ok(2) }).await.unwrap();

        assert_eq!(first, GateOutcome::Ran(1));
        assert_eq!(second, GateOutcome::Skipped);
        assert!(gate.is_complete("job", &phase).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_work_leaves_phase_open() {
        let store = Arc::new(MemoryStore::new());
        let gate = gate(&store);
        let phase = Phase::verify();

        let result = gate
            .run_once("job", &phase, || async { Err::<(), _>(anyhow::anyhow!("boom")) })
            .await;
        assert!(matches!(result, Err(CrawlgateError::Work(_))));
        assert!(!gate.is_complete("job", &phase).await.unwrap());
        assert!(store.lock_holder(&lock_key("verify", "job")).is_none());

        let retry = gate.run_once("job", &phase, || async { Ok(()) }).await.unwrap();
        assert!(retry.ran());
    }

    #[tokio::test]
    async fn test_rerun_ignores_marker() {
        let store = Arc::new(MemoryStore::new());
        let gate = gate(&store);
        let phase = Phase::init();

        gate.run_once("job", &phase, || async { Ok(()) }).await.unwrap();
        let outcome = gate
            .rerun("job", &phase, || async { Ok(()) }, || async { Ok("again") })
            .await
            .unwrap();

        assert_eq!(outcome, GateOutcome::Ran("again"));
        assert!(gate.is_complete("job", &phase).await.unwrap());
    }

    #[tokio::test]
    async fn test_local_gate_always_runs() {
        let gate = StatusGate::local();
        let phase = Phase::init();

        assert!(gate.run_once("job", &phase, || async { Ok(()) }).await.unwrap().ran());
        assert!(gate.run_once("job", &phase, || async { Ok(()) }).await.unwrap().ran());
        assert_eq!(gate.status("job", &phase).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_panicking_work_releases_lock() {
        let store = Arc::new(MemoryStore::new());
        let gate = gate(&store);
        let phase = Phase::init();

        let handle = {
            let gate = gate.clone();
            let phase = phase.clone();
            tokio::spawn(async move {
                let explode = true;
                gate.run_once("job", &phase, move || async move {
                    if explode {
                        panic!("work exploded");
                    }
                    Ok(())
                })
                .await
            })
        };

        assert!(handle.await.unwrap_err().is_panic());
        assert!(store.lock_holder(&lock_key("init", "job")).is_none());
        assert!(!gate.is_complete("job", &phase).await.unwrap());
    }
}
