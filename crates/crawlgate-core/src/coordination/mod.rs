//! Cross-instance coordination
//!
//! [`DistributedLock`] gives TTL-bounded mutual exclusion over the shared
//! store; [`StatusGate`] builds "at most once per job identity" phases on top
//! of it, used by the initialization and verification coordinators.

pub mod gate;
pub mod init;
pub mod lock;
pub mod verify;

pub use gate::{GateOutcome, Phase, StatusGate};
pub use init::{InitializationCoordinator, SeedReport};
pub use lock::{lock_key, DistributedLock};
pub use verify::{DataVerifier, FnVerifier, VerificationCoordinator, VerificationOutcome};
