//! Error types for the crawlgate CLI

use crawlgate_common::CrawlgateError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// No shared store to talk to
    #[error("No shared store configured. Pass --store-url or set CRAWLGATE_STORE_URL.")]
    MissingStore,

    /// Coordination layer failed
    #[error("{0}")]
    Coordination(#[from] CrawlgateError),
}
