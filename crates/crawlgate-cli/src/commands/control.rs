//! `crawlgate control` command implementation

use colored::Colorize;
use crawlgate_core::control::{send_command, ControlCommand};
use crawlgate_core::job::JobIdentity;

use super::open_store;
use crate::error::Result;

/// Publish `command` on the control topic of `identity`
pub async fn run(store_url: Option<&str>, identity: &str, command: ControlCommand) -> Result<()> {
    let identity = JobIdentity::new(identity)?;
    let store = open_store(store_url).await?;

    send_command(store.as_ref(), &identity, command).await?;

    println!(
        "{} Sent {} to {}",
        "✓".green(),
        command.as_str().bold(),
        identity.as_str().cyan()
    );
    println!("  Delivery is best-effort; only running instances receive it.");

    Ok(())
}
