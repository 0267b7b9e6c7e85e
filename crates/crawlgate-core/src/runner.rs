//! End-to-end run of one job instance
//!
//! 1. Record the job as running
//! 2. Seed start requests, once per identity
//! 3. Subscribe to the control channel
//! 4. Crawl
//! 5. Verify collected data, once per identity
//! 6. Remove the running record

use anyhow::Context;
use crawlgate_common::{CrawlgateError, Result};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

use crate::config::{CoordinatorConfig, LockSettings};
use crate::control::ControlChannel;
use crate::coordination::{
    DataVerifier, GateOutcome, InitializationCoordinator, SeedReport, StatusGate,
    VerificationCoordinator, VerificationOutcome,
};
use crate::job::{CrawlJob, JobIdentity, StartRequestBuilder};
use crate::running_state::{PgRunningStateStore, RunningStateRegistry, RunningStateStore};
use crate::schema::{Entity, SchemaGenerator, TypeDescriptor};
use crate::store::{ConnectionRegistry, SharedStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Re-seed even if another instance already initialized this identity
    pub force_rerun: bool,
}

/// What one instance did during [`JobRunner::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub identity: JobIdentity,
    /// `None` when another instance had already seeded the queue
    pub seeded: Option<SeedReport>,
    pub control_connected: bool,
    pub verification: VerificationOutcome,
}

pub struct JobRunner {
    store: Option<Arc<dyn SharedStore>>,
    lock: LockSettings,
    running_state: RunningStateRegistry,
    entities: Vec<Entity>,
    builders: Vec<Arc<dyn StartRequestBuilder>>,
    verifier: Option<Arc<dyn DataVerifier>>,
}

impl JobRunner {
    pub fn new(
        store: Option<Arc<dyn SharedStore>>,
        running_state: RunningStateRegistry,
        lock: LockSettings,
    ) -> Self {
        Self {
            store,
            lock,
            running_state,
            entities: Vec::new(),
            builders: Vec::new(),
            verifier: None,
        }
    }

    /// Runner backed by the Postgres stores named in `config`
    pub async fn from_config(config: &CoordinatorConfig, connections: &ConnectionRegistry) -> Result<Self> {
        config.validate()?;

        let store: Option<Arc<dyn SharedStore>> = match &config.store_url {
            Some(url) => Some(connections.shared_store(url).await? as Arc<dyn SharedStore>),
            None => None,
        };

        let running_state: Option<Arc<dyn RunningStateStore>> = match &config.database_url {
            Some(url) => {
                let pool = connections.pool(url).await?;
                Some(Arc::new(PgRunningStateStore::new(pool)) as Arc<dyn RunningStateStore>)
            },
            None => None,
        };

        Ok(Self::new(
            store,
            RunningStateRegistry::new(running_state, config.task_id.clone()),
            config.lock,
        ))
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Generate and register the schema of every descriptor
    pub fn with_schema<'a, I>(mut self, generator: &SchemaGenerator, descriptors: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a TypeDescriptor>,
    {
        let entities = generator.generate_all(descriptors)?;
        self.entities.extend(entities);
        Ok(self)
    }

    pub fn with_start_requests(mut self, builder: Arc<dyn StartRequestBuilder>) -> Self {
        self.builders.push(builder);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn DataVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn is_distributed(&self) -> bool {
        self.store.is_some()
    }

    /// Run `job` through every phase
    ///
    /// The running record is removed whether or not the crawl succeeded; a
    /// crawl error takes precedence over a bookkeeping error in the result.
    pub async fn run(&self, job: &dyn CrawlJob, options: RunOptions) -> Result<RunReport> {
        let identity = job.identity().clone();

        if self.entities.is_empty() {
            return Err(CrawlgateError::Configuration(format!(
                "Job '{}' has no entity schema registered",
                job.name()
            )));
        }

        let span = info_span!("job", identity = %identity, name = %job.name());

        async move {
            info!(
                entities = self.entities.len(),
                distributed = self.is_distributed(),
                force_rerun = options.force_rerun,
                "Starting job"
            );

            self.running_state.register(job.name(), &identity).await?;

            let result = self.run_registered(job, &identity, options).await;
            let unregistered = self.running_state.unregister(&identity).await;

            match (result, unregistered) {
                (Ok(report), Ok(())) => {
                    info!(verification = ?report.verification, "Job finished");
                    Ok(report)
                },
                (Ok(_), Err(e)) => Err(e),
                (Err(e), Ok(())) => Err(e),
                (Err(e), Err(unregister_error)) => {
                    warn!(error = %unregister_error, "Failed to remove running state after job failure");
                    Err(e)
                },
            }
        }
        .instrument(span)
        .await
    }

    async fn run_registered(
        &self,
        job: &dyn CrawlJob,
        identity: &JobIdentity,
        options: RunOptions,
    ) -> Result<RunReport> {
        let gate = StatusGate::new(self.store.clone(), self.lock);
        let queue = job.request_queue();

        let seeded = InitializationCoordinator::new(gate.clone(), self.builders.clone())
            .initialize(identity, queue, options.force_rerun)
            .await?;

        let mut control = ControlChannel::subscribe(self.store.as_ref(), identity).await;
        let control_connected = control.is_connected();

        let crawled = job.crawl(&mut control).await.context("Crawl failed");
        drop(control);

        let report = match crawled {
            Ok(()) => {
                let verification = VerificationCoordinator::new(gate, self.verifier.clone())
                    .verify(identity)
                    .await;
                Ok(RunReport {
                    identity: identity.clone(),
                    seeded: match seeded {
                        GateOutcome::Ran(report) => Some(report),
                        GateOutcome::Skipped => None,
                    },
                    control_connected,
                    verification,
                })
            },
            Err(e) => Err(CrawlgateError::Work(e)),
        };

        if let Err(e) = queue.dispose().await {
            warn!(error = %e, "Failed to dispose request queue");
        }

        report
    }
}
