//! Post-run verification, once per job identity
//!
//! Verification is an observability signal. Whatever goes wrong in here,
//! whether the operator's check fails or the store is unreachable, is logged
//! and reported as [`VerificationOutcome::Failed`] but never aborts the job.
//! A failed check leaves the phase open so a later instance verifies again.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

use super::gate::{GateOutcome, Phase, StatusGate};
use crate::job::JobIdentity;

/// Operator-supplied check over the collected data
#[async_trait]
pub trait DataVerifier: Send + Sync {
    async fn verify(&self, identity: &JobIdentity) -> anyhow::Result<()>;
}

/// Adapts an async closure into a [`DataVerifier`]
pub struct FnVerifier<F>(pub F);

#[async_trait]
impl<F, Fut> DataVerifier for FnVerifier<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn verify(&self, _identity: &JobIdentity) -> anyhow::Result<()> {
        (self.0)().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// No verifier configured
    NotConfigured,
    Passed,
    /// Another instance already verified this identity
    AlreadyVerified,
    Failed(String),
}

pub struct VerificationCoordinator {
    gate: StatusGate,
    phase: Phase,
    verifier: Option<Arc<dyn DataVerifier>>,
}

impl VerificationCoordinator {
    pub fn new(gate: StatusGate, verifier: Option<Arc<dyn DataVerifier>>) -> Self {
        Self {
            gate,
            phase: Phase::verify(),
            verifier,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub async fn verify(&self, identity: &JobIdentity) -> VerificationOutcome {
        let Some(verifier) = &self.verifier else {
            return VerificationOutcome::NotConfigured;
        };

        let result = self
            .gate
            .run_once(identity.as_str(), &self.phase, || async {
                info!(identity = %identity, "Verifying collected data");
                verifier.verify(identity).await
            })
            .await;

        match result {
            Ok(GateOutcome::Ran(())) => {
                info!(identity = %identity, "Data verification finished");
                VerificationOutcome::Passed
            },
            Ok(GateOutcome::Skipped) => VerificationOutcome::AlreadyVerified,
            Err(e) => {
                error!(identity = %identity, error = %e, "Data verification failed");
                VerificationOutcome::Failed(e.to_string())
            },
        }
    }
}
