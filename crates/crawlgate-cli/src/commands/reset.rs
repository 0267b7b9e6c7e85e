//! `crawlgate reset` command implementation

use colored::Colorize;
use crawlgate_core::job::JobIdentity;

use super::{gate, open_store};
use crate::error::Result;
use crate::PhaseArg;

/// Delete the markers of `phase` so the next run executes it again
///
/// Queued requests are left alone; use a forced rerun to reseed from scratch.
pub async fn run(store_url: Option<&str>, identity: &str, phase: PhaseArg) -> Result<()> {
    let identity = JobIdentity::new(identity)?;
    let gate = gate(open_store(store_url).await?);

    for phase in phase.phases() {
        gate.clear(identity.as_str(), &phase).await?;
        println!("{} Reset {} for {}", "✓".green(), phase.namespace.bold(), identity.as_str().cyan());
    }

    Ok(())
}
