//! TXN Transaction
//!
//! Transaction-scoped error handling and resource cleanup.
//!
//! Responsibilities:
//! - Create root and nested transactions and run their lifecycle handlers
//! - Carry raised exceptions back to the owning creation point from any depth
//! - Track resources acquired inside a transaction and release them at its end
//! - Report misuse of the engine as contract violations
//!
//! # Example
//!
//! ```ignore
//! use txn_transaction::{Audience, Handlers, Tracked, Transaction, TxResult};
//!
//! fn load(tx: &Transaction) -> TxResult<()> {
//!     let buf = tx.acquire_bytes(1000, true)?;
//!     parse(tx, buf)
//! }
//!
//! fn parse(tx: &Transaction, _buf: Option<Tracked<Vec<u8>>>) -> TxResult<()> {
//!     Err(tx.raise_recipient(Audience::User, "bad file", "line 3", "fix line 3"))
//! }
//!
//! let handlers = Handlers::new()
//!     .with_normal_stop(|_| println!("done"))
//!     .with_abort(|tx| println!("{}", tx.pending_exception().unwrap()));
//! let outcome = Transaction::run("load", handlers, load)?;
//! assert!(outcome.is_aborted());
//! ```

mod config;
mod context;
mod error;
mod handler;
mod unwind;

pub use config::TransactionConfig;
pub use context::{Outcome, Phase, Transaction};
pub use error::{TransactionError, TransactionResult};
pub use handler::{Handlers, TransactionHandler};
pub use unwind::{TransferStatus, TxResult, Unwind};

pub use txn_core::{Audience, ExceptionKind, ExceptionRecord, ResourceId, TransactionId, ALLOCATION_FAILURE};
pub use txn_tracker::{ReleaseOrder, ResourceKind, Tracked};
