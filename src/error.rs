//! Error types for IPA inspection.
//!
//! The Mach-O and code-signature parsers never fail: fields they cannot read
//! safely are left empty. Errors here describe conditions that abort a whole
//! inspection attempt (unreadable input, broken archive, missing bundle
//! structure) plus the plumbing around background execution.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for inspection operations.
#[derive(Debug, Error)]
pub enum IpaScopeError {
    /// The input file could not be opened or read
    #[error("Cannot read {}: {source}", path.display())]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive is corrupt or not a ZIP file
    #[error("Failed to extract archive: {0}")]
    Extraction(String),

    /// The archive has no top-level `Payload/` directory
    #[error("Missing Payload folder")]
    MissingPayload,

    /// `Payload/` contains no `.app` bundle
    #[error("No .app bundle found in Payload folder")]
    NoAppBundle,

    /// The bundle's main executable could not be located
    #[error("Main executable not found: {0}")]
    NoExecutable(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Property list decoding errors
    #[error("Property list error: {0}")]
    Plist(String),

    /// Inspection timeout
    #[error("Inspection timeout after {seconds}s")]
    Timeout { seconds: u64 },

    /// The background worker panicked or was aborted
    #[error("Inspection task failed: {0}")]
    TaskFailed(String),

    /// The caller gave up on the inspection before it finished
    #[error("Inspection cancelled")]
    Cancelled,

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<zip::result::ZipError> for IpaScopeError {
    fn from(err: zip::result::ZipError) -> Self {
        IpaScopeError::Extraction(err.to_string())
    }
}

impl From<serde_json::Error> for IpaScopeError {
    fn from(err: serde_json::Error) -> Self {
        IpaScopeError::Serialization(err.to_string())
    }
}

impl IpaScopeError {
    /// Whether this error is one of the structural-bundle failures.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            IpaScopeError::MissingPayload
                | IpaScopeError::NoAppBundle
                | IpaScopeError::NoExecutable(_)
        )
    }
}

/// Result type alias for inspection operations
pub type Result<T> = std::result::Result<T, IpaScopeError>;
