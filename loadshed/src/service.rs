//! LoadShedService: transport-agnostic request handling.
//!
//! This service owns:
//! - The admission controller (bounded concurrency gate)
//! - The stats aggregator (per-second outcome counts)
//! - The unit of work performed while a permit is held
//! - Shutdown coordination (cancels callers suspended at the gate)
//!
//! It is constructed once and shared by reference; transports (HTTP) delegate
//! every request to [`LoadShedService::handle`].

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::admission::{AdmissionController, AdmissionError};
use crate::config::HarnessConfig;
use crate::health::{self, HealthSnapshot};
use crate::permit::PoolError;
use crate::render::chart_title;
use crate::stats::{Outcome, Stats};
use crate::version::VersionInfo;
use crate::work::{SleepWork, Work};

pub struct LoadShedService {
    admission: AdmissionController,
    stats: Arc<Stats>,
    work: Arc<dyn Work>,
    acquire_timeout: Option<Duration>,
    shutdown: CancellationToken,
    version: VersionInfo,
}

impl LoadShedService {
    pub fn new(admission: AdmissionController, stats: Arc<Stats>, work: Arc<dyn Work>) -> Self {
        Self {
            admission,
            stats,
            work,
            acquire_timeout: None,
            shutdown: CancellationToken::new(),
            version: VersionInfo::new(),
        }
    }

    /// Build the gate, aggregator and sleep work described by `config`.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, PoolError> {
        let admission = AdmissionController::new(config.limit, config.mode)?;
        let stats = Arc::new(Stats::new(chart_title(config.limit, config.sleep)));
        let work = Arc::new(SleepWork::new(config.sleep));

        Ok(Self::new(admission, stats, work).with_acquire_timeout(config.acquire_timeout))
    }

    /// Bound how long a blocking acquire may wait. `None` waits until shutdown.
    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Token for one request. Cancelled by shutdown, or by the transport when
    /// the caller goes away.
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Admit, work, record and release; or record the rejection.
    ///
    /// `cancel` only affects the wait at the gate. Once admitted the work runs
    /// to completion and is recorded even if `cancel` fires. Callers that may
    /// be dropped mid-request should drive this on a spawned task.
    pub async fn handle(&self, cancel: &CancellationToken) -> Result<(), AdmissionError> {
        let acquired = match self.acquire_timeout {
            Some(limit) => tokio::time::timeout(limit, self.admission.acquire(cancel))
                .await
                .unwrap_or(Err(AdmissionError::Cancelled)),
            None => self.admission.acquire(cancel).await,
        };

        let permit = match acquired {
            Ok(permit) => permit,
            Err(e) => {
                self.stats.record_now(Outcome::Rejected);
                tracing::debug!(error = %e, "Request rejected");
                return Err(e);
            }
        };

        tracing::trace!(permit = %permit.id(), "Request admitted");
        self.work.perform().await;
        self.stats.record_now(Outcome::Admitted);
        self.admission.release(permit);

        Ok(())
    }

    pub fn health(&self) -> HealthSnapshot {
        let counts = self.admission.pool().counts();

        HealthSnapshot {
            status: health::status(self.shutdown.is_cancelled(), counts.available),
            mode: self.admission.mode(),
            capacity: counts.capacity,
            outstanding: counts.outstanding,
            available: counts.available,
            waiters: counts.waiters,
            totals: self.stats.totals(),
            version: self.version.clone(),
        }
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
