//! loadshed: load-shedding test harness.
//!
//! An admission controller admits at most a fixed number of concurrent
//! requests (failing fast or queueing the rest) while a stats aggregator
//! records per-second outcome counts for later inspection.

mod health;
mod version;

pub mod admission;
pub mod config;
pub mod logging;
pub mod permit;
pub mod render;
pub mod service;
pub mod stats;
pub mod transport;
pub mod work;

pub use admission::{AdmissionController, AdmissionError, AdmissionMode};
pub use config::{ConfigError, HarnessConfig, ServerArgs};
pub use health::{Health, HealthSnapshot};
pub use permit::{AcquireError, Permit, PermitId, PermitPool, PoolCounts, PoolError};
pub use service::LoadShedService;
pub use stats::{Bucket, Outcome, Snapshot, Stats};
pub use version::{LOADSHED_VERSION, VersionInfo};
pub use work::{SleepWork, Work};
