//! Wall-clock bounds for external tool invocations.
//!
//! The orchestrator is synchronous; these helpers run one future to completion
//! on a throwaway current-thread runtime so a bound can be enforced without
//! turning the batch loop async.

use crate::error::{PackReplayError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error};

/// Timeout configuration for a single tool invocation
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Maximum duration for the operation
    pub duration: Duration,
    /// Operation name for logging
    pub operation_name: String,
}

impl TimeoutConfig {
    /// Create a new timeout configuration
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
            Err(PackReplayError::Timeout {
                seconds: config.duration.as_secs(),
            })
        }
    }
}

/// Block the calling thread on `future`, optionally bounded by `config`.
pub fn block_on<T, F>(config: Option<TimeoutConfig>, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match config {
        Some(config) => runtime.block_on(with_timeout(config, future)),
        None => runtime.block_on(future),
    }
}
