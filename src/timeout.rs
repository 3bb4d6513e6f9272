//! Timeout utilities for background inspection.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error};

use crate::error::{IpaScopeError, Result};

/// Timeout configuration for one operation
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Maximum duration for the operation
    pub duration: Duration,
    /// Operation name for logging
    pub operation_name: String,
}

impl TimeoutConfig {
    pub fn new(seconds: u64, operation: impl Into<String>) -> Self {
        Self {
            duration: Duration::from_secs(seconds),
            operation_name: operation.into(),
        }
    }
}

/// Execute an async operation with a timeout
pub async fn with_timeout<T, F>(config: TimeoutConfig, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    debug!(
        "Starting operation '{}' with timeout of {}s",
        config.operation_name,
        config.duration.as_secs()
    );

    match timeout(config.duration, future).await {
        Ok(result) => result,
        Err(_) => {
            error!(
                "Operation '{}' timed out after {}s",
                config.operation_name,
                config.duration.as_secs()
            );
            Err(IpaScopeError::Timeout {
                seconds: config.duration.as_secs(),
            })
        }
    }
}
