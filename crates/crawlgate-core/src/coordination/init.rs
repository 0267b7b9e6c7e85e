//! Start-request seeding, once per job identity
//!
//! The first instance to reach initialization seeds the shared pending-request
//! queue from the configured builders; the others find the phase finished and
//! go straight to crawling. A forced rerun empties the queue and seeds again
//! even if the phase already finished.

use anyhow::Context;
use crawlgate_common::{CrawlgateError, Result};
use std::sync::Arc;
use tracing::info;

use super::gate::{GateOutcome, Phase, StatusGate};
use crate::job::{JobIdentity, RequestQueue, StartRequestBuilder};

/// Result of a seeding run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedReport {
    pub builders: usize,
    pub requests: usize,
}

pub struct InitializationCoordinator {
    gate: StatusGate,
    phase: Phase,
    builders: Vec<Arc<dyn StartRequestBuilder>>,
}

impl InitializationCoordinator {
    pub fn new(gate: StatusGate, builders: Vec<Arc<dyn StartRequestBuilder>>) -> Self {
        Self {
            gate,
            phase: Phase::init(),
            builders,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Initialize the queue and seed it unless another instance already did
    ///
    /// With `force`, the queue is cleaned and the init and verify markers are
    /// dropped under the init lock before seeding.
    pub async fn initialize(
        &self,
        identity: &JobIdentity,
        queue: &dyn RequestQueue,
        force: bool,
    ) -> Result<GateOutcome<SeedReport>> {
        queue
            .init(identity)
            .await
            .context("Failed to initialize request queue")
            .map_err(CrawlgateError::Work)?;

        let seed = || self.seed(queue);

        let outcome = if force {
            info!(identity = %identity, "Forced rerun requested, resetting start requests");
            self.gate
                .rerun(identity.as_str(), &self.phase, || self.reset(identity, queue), seed)
                .await?
        } else {
            self.gate.run_once(identity.as_str(), &self.phase, seed).await?
        };

        if let GateOutcome::Ran(report) = &outcome {
            info!(
                identity = %identity,
                builders = report.builders,
                requests = report.requests,
                "Start requests seeded"
            );
        }

        Ok(outcome)
    }

    async fn reset(&self, identity: &JobIdentity, queue: &dyn RequestQueue) -> anyhow::Result<()> {
        queue.clean().await.context("Failed to clean request queue")?;
        self.gate.clear(identity.as_str(), &Phase::verify()).await?;
        Ok(())
    }

    async fn seed(&self, queue: &dyn RequestQueue) -> anyhow::Result<SeedReport> {
        let mut report = SeedReport::default();

        for (step, builder) in self.builders.iter().enumerate() {
            info!(step = step + 1, builder = %builder.name(), "Adding start requests to the queue");
            let pushed = builder
                .build(queue)
                .await
                .with_context(|| format!("Start request builder '{}' failed", builder.name()))?;
            report.builders += 1;
            report.requests += pushed;
        }

        Ok(report)
    }
}
