//! Permit pool for bounded concurrency.
//!
//! Permits are RAII guards: a permit goes back to its pool exactly once, when
//! released or dropped, on every exit path of the holder.
//! - `try_acquire` never waits
//! - `acquire` suspends until a release hands a slot over, or the caller's
//!   cancellation token fires

mod pool;

pub use pool::{AcquireError, Permit, PermitId, PermitPool, PoolCounts, PoolError};
