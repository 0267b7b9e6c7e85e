//! Crawlgate Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the crawlgate workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CrawlgateError`], [`SchemaError`] and the [`Result`] alias
//! - **Logging**: structured `tracing` setup driven by [`logging::LogConfig`]
//!
//! # Example
//!
//! ```no_run
//! use crawlgate_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("coordinator starting");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{CrawlgateError, Result, SchemaError};
