//! TXN Core Types
//!
//! This crate provides the foundational types used throughout the TXN system:
//! - Identity types (TransactionId, ResourceId)
//! - The exception model (ExceptionRecord and its Sender/Recipient variants)
//! - Recipient audiences and well-known sender categories
//! - Common error types

mod error;
mod exception;
mod id;

pub use error::*;
pub use exception::*;
pub use id::*;
