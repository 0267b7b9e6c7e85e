//! `crawlgate status` command implementation
//!
//! Shows which gated phases a job identity has finished.

use colored::Colorize;
use crawlgate_core::coordination::Phase;
use crawlgate_core::job::JobIdentity;

use super::{gate, open_store};
use crate::error::Result;

pub async fn run(store_url: Option<&str>, identity: &str) -> Result<()> {
    let identity = JobIdentity::new(identity)?;
    let gate = gate(open_store(store_url).await?);

    println!("{} {}", "Job:".cyan().bold(), identity);
    println!();

    for phase in [Phase::init(), Phase::verify()] {
        let marker = gate.status(identity.as_str(), &phase).await?;
        let state = match marker.as_deref() {
            Some(marker) if marker == phase.marker => "finished".green(),
            Some(_) => "unknown marker".yellow(),
            None => "pending".dimmed(),
        };
        println!("  {:<8} {}", phase.namespace, state);
    }

    Ok(())
}
