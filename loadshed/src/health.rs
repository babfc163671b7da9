//! Health reporting for the harness.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::admission::AdmissionMode;
use crate::stats::Outcome;
use crate::version::VersionInfo;

/// Gate status as seen by the health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Health {
    /// At least one permit is free
    Ready,
    /// Every permit is held
    Busy,
    /// Shutdown has started; waiting callers are being cancelled
    ShuttingDown,
}

/// Point-in-time view of the gate and the recorded outcomes.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: Health,
    pub mode: AdmissionMode,
    pub capacity: usize,
    pub outstanding: usize,
    pub available: usize,
    pub waiters: usize,
    pub totals: BTreeMap<Outcome, u64>,
    pub version: VersionInfo,
}

impl HealthSnapshot {
    pub fn is_busy(&self) -> bool {
        self.status == Health::Busy
    }
}

pub(crate) fn status(shutting_down: bool, available: usize) -> Health {
    if shutting_down {
        Health::ShuttingDown
    } else if available == 0 {
        Health::Busy
    } else {
        Health::Ready
    }
}
