//! Units of work performed while a permit is held.

use std::time::Duration;

use async_trait::async_trait;

/// Downstream work a request does between admission and release.
#[async_trait]
pub trait Work: Send + Sync {
    async fn perform(&self);
}

/// Stand-in for real work: sleep for a fixed duration.
#[derive(Debug, Clone, Copy)]
pub struct SleepWork {
    duration: Duration,
}

impl SleepWork {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Work for SleepWork {
    async fn perform(&self) {
        tokio::time::sleep(self.duration).await;
    }
}
