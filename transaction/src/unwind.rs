//! The control-transfer token.
//!
//! Ending a transaction from any call depth produces an [`Unwind`]. Every
//! frame between that call and the transaction's creation point returns it
//! with `?`; the frames are dropped on the way and never resume. The creation
//! point reads the token to decide which handler runs.

use std::fmt;

use txn_core::TransactionId;

use crate::error::TransactionError;

/// Result of code running inside a transaction.
pub type TxResult<T> = Result<T, Unwind>;

/// Why control is travelling back to a creation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// An explicit finish.
    StoppedNormally,
    /// An exception was raised.
    Aborted,
    /// The engine was misused; see [`Unwind::violation`].
    Fault,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::StoppedNormally => write!(f, "stopped normally"),
            TransferStatus::Aborted => write!(f, "aborted"),
            TransferStatus::Fault => write!(f, "fault"),
        }
    }
}

#[derive(Debug)]
enum Transfer {
    Stop,
    Abort,
    Fault(TransactionError),
}

/// A control transfer in flight to the creation point of `target`.
///
/// Only the engine creates these. Code that receives one must hand it back
/// to its caller.
#[must_use = "an Unwind must be returned to the transaction's creation point"]
#[derive(Debug)]
pub struct Unwind {
    target: TransactionId,
    transfer: Transfer,
}

impl Unwind {
    pub(crate) fn stop(target: TransactionId) -> Self {
        Self {
            target,
            transfer: Transfer::Stop,
        }
    }

    pub(crate) fn abort(target: TransactionId) -> Self {
        Self {
            target,
            transfer: Transfer::Abort,
        }
    }

    pub(crate) fn fault(target: TransactionId, violation: TransactionError) -> Self {
        Self {
            target,
            transfer: Transfer::Fault(violation),
        }
    }

    /// The transaction whose creation point this transfer returns to.
    pub fn target(&self) -> TransactionId {
        self.target
    }

    pub fn status(&self) -> TransferStatus {
        match self.transfer {
            Transfer::Stop => TransferStatus::StoppedNormally,
            Transfer::Abort => TransferStatus::Aborted,
            Transfer::Fault(_) => TransferStatus::Fault,
        }
    }

    /// The contract violation carried by a fault transfer.
    pub fn violation(&self) -> Option<&TransactionError> {
        match &self.transfer {
            Transfer::Fault(violation) => Some(violation),
            _ => None,
        }
    }

    /// Turn a transfer that could not be delivered into an error.
    pub(crate) fn into_error(self, reached: TransactionId) -> TransactionError {
        match self.transfer {
            Transfer::Fault(violation) => violation,
            _ => TransactionError::StrayTransfer {
                target: self.target,
                reached,
            },
        }
    }
}

impl fmt::Display for Unwind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transfer to {}: {}", self.target, self.status())?;
        if let Some(violation) = self.violation() {
            write!(f, " ({})", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for Unwind {}
