//! Configuration for IPA inspection.
//!
//! Parser caps (fat slices, load commands, SuperBlob entries) are fixed
//! constants in their modules; only the I/O-facing limits of the
//! orchestrator are tunable here.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Provisioning profiles larger than this are skipped with a warning.
pub const DEFAULT_MAX_PROFILE_BYTES: u64 = 10 * 1024 * 1024;

/// Executables larger than this are not read into memory.
pub const DEFAULT_MAX_EXECUTABLE_BYTES: u64 = 512 * 1024 * 1024;

/// Maximum decompressed size per archive entry (2 GB), guards against zip bombs.
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 2 * 1024 * 1024 * 1024;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

/// Limits applied by the inspection workflow and the integrity checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    /// Ceiling for `embedded.mobileprovision`.
    pub max_profile_bytes: u64,
    /// Ceiling for the main executable.
    pub max_executable_bytes: u64,
    /// Per-entry decompressed size cap during extraction.
    pub max_entry_bytes: u64,
    /// Timeout for the async entry points.
    pub timeout_seconds: u64,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            max_profile_bytes: DEFAULT_MAX_PROFILE_BYTES,
            max_executable_bytes: DEFAULT_MAX_EXECUTABLE_BYTES,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl InspectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_max_profile_bytes(mut self, bytes: u64) -> Self {
        self.max_profile_bytes = bytes;
        self
    }

    pub fn with_max_executable_bytes(mut self, bytes: u64) -> Self {
        self.max_executable_bytes = bytes;
        self
    }

    pub fn with_max_entry_bytes(mut self, bytes: u64) -> Self {
        self.max_entry_bytes = bytes;
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}
