//! Crawlgate Core
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Coordination for crawl jobs running as several instances under one job
//! identity. Seeding and verification run at most once per identity, guarded
//! by TTL-bounded locks in a shared store, while operators steer every
//! instance over a broadcast control channel.
//!
//! # Modules
//!
//! - [`schema`]: extraction schema derivation from declarative descriptors
//! - [`table_name`]: date-suffixed table naming
//! - [`store`]: shared-store trait with Postgres and in-memory backends
//! - [`coordination`]: distributed lock, status gate, init and verify phases
//! - [`control`]: remote lifecycle commands
//! - [`running_state`]: running-job bookkeeping
//! - [`runner`]: ties the phases together for one job instance
//!
//! # Example
//!
//! ```no_run
//! use crawlgate_core::config::CoordinatorConfig;
//! use crawlgate_core::runner::JobRunner;
//! use crawlgate_core::store::ConnectionRegistry;
//!
//! # async fn example() -> crawlgate_common::Result<()> {
//! let config = CoordinatorConfig::load()?;
//! let connections = ConnectionRegistry::new(config.max_connections);
//! let runner = JobRunner::from_config(&config, &connections).await?;
//! assert_eq!(runner.is_distributed(), config.store_url.is_some());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod control;
pub mod coordination;
pub mod job;
pub mod runner;
pub mod running_state;
pub mod schema;
pub mod store;
pub mod table_name;

pub use config::{CoordinatorConfig, LockSettings};
pub use control::{ControlChannel, ControlCommand, ControlReceiver};
pub use coordination::{
    DistributedLock, GateOutcome, InitializationCoordinator, Phase, StatusGate,
    VerificationCoordinator, VerificationOutcome,
};
pub use job::{CrawlJob, JobIdentity, JobLifecycle, RequestQueue, StartRequest, StartRequestBuilder};
pub use runner::{JobRunner, RunOptions, RunReport};
pub use running_state::RunningStateRegistry;
pub use schema::{Entity, SchemaGenerator, TypeDescriptor};
pub use table_name::TableSuffix;
