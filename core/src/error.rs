//! Common error types for TXN.

use thiserror::Error;

/// Errors that can occur while building or classifying exception records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExceptionError {
    /// The code does not name a recipient audience.
    #[error("Unknown recipient audience code: {0}")]
    UnknownAudience(u32),
}

/// Result type for exception model operations.
pub type ExceptionResult<T> = Result<T, ExceptionError>;
