//! Dispatch pool error types.

use std::fmt;
use std::time::Duration;

/// Errors that can occur while submitting work to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Every request identifier is currently held by an in-flight request.
    CapacityExceeded {
        /// Size of the identifier pool.
        capacity: usize,
    },

    /// The request did not complete before the caller's deadline.
    Timeout(Duration),

    /// A lane work unit panicked while executing.
    WorkerPanic {
        /// Lane the unit ran on.
        lane: usize,
        /// Panic payload, if it was a string.
        message: String,
    },

    /// The operation's split or package step panicked.
    OperationPanic(String),

    /// The gathered unit count differs from the operation's declared count.
    UnitCountMismatch {
        expected: usize,
        actual: usize,
    },

    /// The pool has been shut down.
    Shutdown,

    /// The reply channel was closed before a result was published.
    ChannelClosed,

    /// A pool thread could not be spawned.
    Spawn(String),

    /// The metrics registry rejected a collector.
    Metrics(String),
}

impl PoolError {
    /// Check if this is an identifier exhaustion error.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, PoolError::CapacityExceeded { .. })
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PoolError::Timeout(_))
    }

    /// Check if this is a shutdown error.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, PoolError::Shutdown)
    }

    /// Check if user code (a unit step, split or package) panicked.
    pub fn is_panic(&self) -> bool {
        matches!(
            self,
            PoolError::WorkerPanic { .. } | PoolError::OperationPanic(_)
        )
    }

    /// Short label for logs and metrics.
    pub fn message(&self) -> &'static str {
        match self {
            PoolError::CapacityExceeded { .. } => "Capacity exceeded",
            PoolError::Timeout(_) => "Request timeout",
            PoolError::WorkerPanic { .. } => "Worker panic",
            PoolError::OperationPanic(_) => "Operation panic",
            PoolError::UnitCountMismatch { .. } => "Unit count mismatch",
            PoolError::Shutdown => "Pool shutdown",
            PoolError::ChannelClosed => "Channel closed",
            PoolError::Spawn(_) => "Spawn failed",
            PoolError::Metrics(_) => "Metrics error",
        }
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::CapacityExceeded { capacity } => {
                write!(f, "all {} request identifiers are in use", capacity)
            }
            PoolError::Timeout(duration) => {
                write!(f, "request timeout after {}ms", duration.as_millis())
            }
            PoolError::WorkerPanic { lane, message } => {
                write!(f, "worker panic on lane {}: {}", lane, message)
            }
            PoolError::OperationPanic(msg) => {
                write!(f, "operation panic: {}", msg)
            }
            PoolError::UnitCountMismatch { expected, actual } => {
                write!(f, "expected {} unit results, gathered {}", expected, actual)
            }
            PoolError::Shutdown => {
                write!(f, "pool has been shut down")
            }
            PoolError::ChannelClosed => {
                write!(f, "reply channel closed unexpectedly")
            }
            PoolError::Spawn(msg) => {
                write!(f, "failed to spawn pool thread: {}", msg)
            }
            PoolError::Metrics(msg) => {
                write!(f, "metrics registration failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for PoolError {}

impl From<prometheus::Error> for PoolError {
    fn from(err: prometheus::Error) -> Self {
        PoolError::Metrics(err.to_string())
    }
}

/// Result type alias for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Extract a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
