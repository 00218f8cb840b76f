//! Pool error types.

use thiserror::Error;

/// Errors that can occur during pool bookkeeping.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The DEA was pruned or shut down between `find_dea` and the
    /// bookkeeping call.
    #[error("dea not found: {0}")]
    DeaNotFound(String),
}

pub type PoolResult<T> = Result<T, PoolError>;
