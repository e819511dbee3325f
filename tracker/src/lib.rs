//! TXN Resource Tracker
//!
//! Records resources acquired inside a transaction and releases them exactly
//! once at teardown.
//!
//! Responsibilities:
//! - Register release actions, generic over the resource type
//! - Hand out shared handles to tracked values
//! - Release in a configurable order (reverse of acquisition by default)
//! - Make teardown idempotent and refuse registrations once it began
//! - Fallible byte allocation for the memory resource kind

mod alloc;
mod error;
mod resource;
mod tracker;

pub use alloc::try_alloc_bytes;
pub use error::{TrackerError, TrackerResult};
pub use resource::{ResourceKind, Tracked};
pub use tracker::{ReleaseOrder, ResourceTracker, Teardown};
