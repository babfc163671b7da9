//! Admission controller: the accept/reject decision in front of the permit pool.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::permit::{AcquireError, Permit, PermitPool, PoolError};

/// How a full pool treats a new caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdmissionMode {
    /// Fail fast with `ResourceExhausted`.
    #[default]
    NonBlocking,
    /// Suspend until a permit is handed over or the caller cancels.
    Blocking,
}

impl AdmissionMode {
    pub fn from_block_flag(block: bool) -> Self {
        if block { Self::Blocking } else { Self::NonBlocking }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonBlocking => "non-blocking",
            Self::Blocking => "blocking",
        }
    }
}

impl fmt::Display for AdmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdmissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "non-blocking" => Ok(Self::NonBlocking),
            "blocking" => Ok(Self::Blocking),
            other => Err(format!(
                "invalid admission mode '{other}', expected 'blocking' or 'non-blocking'"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("Concurrent request limit reached")]
    ResourceExhausted,
    #[error("Cancelled while waiting for admission")]
    Cancelled,
}

impl From<AcquireError> for AdmissionError {
    fn from(e: AcquireError) -> Self {
        match e {
            AcquireError::Cancelled => AdmissionError::Cancelled,
        }
    }
}

/// Bounded-concurrency gate with a fixed capacity and acceptance mode.
pub struct AdmissionController {
    pool: PermitPool,
    mode: AdmissionMode,
}

impl AdmissionController {
    pub fn new(capacity: usize, mode: AdmissionMode) -> Result<Self, PoolError> {
        Ok(Self {
            pool: PermitPool::new(capacity)?,
            mode,
        })
    }

    /// Ask for admission.
    ///
    /// Non-blocking mode ignores `cancel`: it either hands out a permit or fails
    /// with `ResourceExhausted` on the spot. Blocking mode waits for a permit and
    /// returns `Cancelled` if `cancel` fires first (or had already fired).
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Permit, AdmissionError> {
        match self.mode {
            AdmissionMode::NonBlocking => self
                .pool
                .try_acquire()
                .ok_or(AdmissionError::ResourceExhausted),
            AdmissionMode::Blocking => Ok(self.pool.acquire(cancel).await?),
        }
    }

    pub fn release(&self, permit: Permit) {
        permit.release();
    }

    pub fn mode(&self) -> AdmissionMode {
        self.mode
    }

    pub fn pool(&self) -> &PermitPool {
        &self.pool
    }
}
