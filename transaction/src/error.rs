//! Transaction error types.
//!
//! These are contract violations: misuse of the engine by its callers. They
//! never describe the application's own failures, which travel as
//! exception records instead.

use thiserror::Error;
use txn_core::TransactionId;
use txn_tracker::TrackerError;

/// Transaction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// An exception was raised while another one is still pending.
    #[error("{id} already has a pending exception: {pending}")]
    ExceptionPending { id: TransactionId, pending: String },

    /// The transaction was already torn down.
    #[error("{id} is torn down; cannot {operation}")]
    TornDown {
        id: TransactionId,
        operation: &'static str,
    },

    /// The transaction already stopped or aborted.
    #[error("{id} has already ended; cannot {operation}")]
    AlreadyEnded {
        id: TransactionId,
        operation: &'static str,
    },

    /// Finish was called from inside a live child transaction.
    #[error("{id} cannot finish while child {child} is live")]
    LiveChild {
        id: TransactionId,
        child: TransactionId,
    },

    /// A control transfer reached a creation point it was not aimed at.
    #[error("transfer aimed at {target} reached {reached}")]
    StrayTransfer {
        target: TransactionId,
        reached: TransactionId,
    },

    /// Tracker error.
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),
}

impl TransactionError {
    pub fn exception_pending(id: TransactionId, pending: impl Into<String>) -> Self {
        Self::ExceptionPending {
            id,
            pending: pending.into(),
        }
    }

    pub fn torn_down(id: TransactionId, operation: &'static str) -> Self {
        Self::TornDown { id, operation }
    }

    pub fn already_ended(id: TransactionId, operation: &'static str) -> Self {
        Self::AlreadyEnded { id, operation }
    }
}

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;
