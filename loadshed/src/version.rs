//! Version information for loadshed.

/// Loadshed version from Cargo.toml
pub const LOADSHED_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version information reported by the health route.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VersionInfo {
    pub loadshed: &'static str,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            loadshed: LOADSHED_VERSION,
        }
    }
}

impl VersionInfo {
    pub fn new() -> Self {
        Self::default()
    }
}
