//! Error types for mediated-device pool operations

use thiserror::Error;

/// Unified error type for pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The host cannot satisfy the requested number of mediated devices.
    /// The pool guarantees no partial ownership is left behind before this
    /// surfaces; the caller must fail the enclosing workload operation.
    #[error("mediated devices unavailable: {reason}")]
    ResourceUnavailable { reason: String },

    /// The host driver failed while enumerating or acquiring devices.
    #[error("host driver failure: {0}")]
    Driver(#[source] anyhow::Error),
}

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
