//! Command-line and environment configuration for the harness server.

use std::time::Duration;

use clap::Parser;

use crate::admission::AdmissionMode;
use crate::transport::ServerConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("concurrent request limit must be at least 1")]
    ZeroLimit,
}

/// Flags for `loadshed-server`. Each one can also come from a `LOADSHED_*` variable.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "loadshed-server",
    version,
    about = "Admit at most --limit concurrent requests on /pubsub and chart what happened on /stats"
)]
pub struct ServerArgs {
    #[arg(long, env = "LOADSHED_BIND_ADDRESS", default_value = "127.0.0.1")]
    pub bind_address: String,

    #[arg(long, env = "LOADSHED_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Concurrent request limit.
    #[arg(long, env = "LOADSHED_LIMIT", default_value_t = 5)]
    pub limit: usize,

    /// Simulated work per admitted request, in milliseconds.
    #[arg(long, env = "LOADSHED_SLEEP", default_value_t = 500)]
    pub sleep: u64,

    /// Wait for a free slot instead of failing fast when the limit is reached.
    #[arg(long, env = "LOADSHED_BLOCK")]
    pub block: bool,

    /// Give up waiting for a slot after this many milliseconds (blocking mode).
    #[arg(long, env = "LOADSHED_ACQUIRE_TIMEOUT_MS")]
    pub acquire_timeout_ms: Option<u64>,
}

impl ServerArgs {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.bind_address.clone(),
            port: self.port,
        }
    }

    pub fn harness_config(&self) -> Result<HarnessConfig, ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::ZeroLimit);
        }

        Ok(HarnessConfig {
            limit: self.limit,
            sleep: Duration::from_millis(self.sleep),
            mode: AdmissionMode::from_block_flag(self.block),
            acquire_timeout: self.acquire_timeout_ms.map(Duration::from_millis),
        })
    }
}

/// Shape of one harness run: gate capacity, acceptance mode and simulated work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub limit: usize,
    pub sleep: Duration,
    pub mode: AdmissionMode,
    pub acquire_timeout: Option<Duration>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            sleep: Duration::from_millis(500),
            mode: AdmissionMode::NonBlocking,
            acquire_timeout: None,
        }
    }
}
