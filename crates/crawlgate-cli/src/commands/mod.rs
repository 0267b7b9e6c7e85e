//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod control;
pub mod reset;
pub mod status;

use crawlgate_core::config::LockSettings;
use crawlgate_core::coordination::StatusGate;
use crawlgate_core::store::{PgSharedStore, SharedStore};
use std::sync::Arc;

use crate::error::{CliError, Result};

/// One connection is plenty for a single operator command
const CLI_MAX_CONNECTIONS: u32 = 1;

/// Connect to the shared store without migrating it
///
/// Job instances own the schema; operator commands only touch existing state.
pub(crate) async fn open_store(store_url: Option<&str>) -> Result<Arc<dyn SharedStore>> {
    let url = store_url.ok_or(CliError::MissingStore)?;
    let store = PgSharedStore::open(url, CLI_MAX_CONNECTIONS).await?;
    Ok(Arc::new(store))
}

pub(crate) fn gate(store: Arc<dyn SharedStore>) -> StatusGate {
    StatusGate::new(Some(store), LockSettings::default())
}
