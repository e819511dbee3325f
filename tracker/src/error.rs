//! Tracker error types.

use thiserror::Error;
use txn_core::TransactionId;

/// Tracker errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// Teardown already began; the collection no longer grows.
    #[error("resources of {owner} are already torn down")]
    TornDown { owner: TransactionId },
}

impl TrackerError {
    pub fn torn_down(owner: TransactionId) -> Self {
        Self::TornDown { owner }
    }
}

/// Result type for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;
