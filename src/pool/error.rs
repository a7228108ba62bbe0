//! Worker pool error types.

use std::fmt;
use std::time::Duration;

use crate::engine::RenderError;

/// Errors that can occur during pool operations.
///
/// Dead handles and failed replacements are not errors at this level: the
/// pool recovers from them internally (logged and counted in
/// [`PoolStats`](super::PoolStats)).
#[derive(Debug, Clone)]
pub enum PoolError {
    /// A worker could not be launched while filling the pool.
    InitFailure {
        /// Target capacity.
        capacity: usize,
        /// Number of launches that failed.
        failed: usize,
        /// First launch error.
        source: RenderError,
    },

    /// `acquire()` was called before `initialize()`.
    NotInitialized,

    /// The pool has been shut down.
    Shutdown,

    /// No worker became idle within the configured acquire timeout.
    AcquireTimeout(Duration),
}

impl PoolError {
    /// Check if this is a shutdown error.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, PoolError::Shutdown)
    }

    /// Check if this is an acquire timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PoolError::AcquireTimeout(_))
    }

    /// Get the error message for logging.
    pub fn message(&self) -> &'static str {
        match self {
            PoolError::InitFailure { .. } => "Pool init failure",
            PoolError::NotInitialized => "Pool not initialized",
            PoolError::Shutdown => "Pool shutdown",
            PoolError::AcquireTimeout(_) => "Acquire timeout",
        }
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::InitFailure {
                capacity,
                failed,
                source,
            } => {
                write!(
                    f,
                    "pool init failed: {}/{} workers failed to launch: {}",
                    failed, capacity, source
                )
            }
            PoolError::NotInitialized => write!(f, "pool is not initialized"),
            PoolError::Shutdown => write!(f, "pool has been shut down"),
            PoolError::AcquireTimeout(duration) => {
                write!(f, "no worker available after {}ms", duration.as_millis())
            }
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PoolError::InitFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
