//! Transaction configuration.

use serde::{Deserialize, Serialize};
use txn_core::{ExceptionRecord, ALLOCATION_FAILURE};
use txn_tracker::ReleaseOrder;

/// Settings a transaction is created with. Nested transactions inherit the
/// settings of their parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Order in which resources are released at teardown.
    pub release_order: ReleaseOrder,
    /// Stamp raised exceptions with the current thread.
    pub capture_thread: bool,
    /// Sender category raised when a fail-fast allocation fails.
    pub allocation_failure_category: u32,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            release_order: ReleaseOrder::Reverse,
            capture_thread: true,
            allocation_failure_category: ALLOCATION_FAILURE,
        }
    }
}

impl TransactionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_release_order(mut self, order: ReleaseOrder) -> Self {
        self.release_order = order;
        self
    }

    pub fn with_capture_thread(mut self, enabled: bool) -> Self {
        self.capture_thread = enabled;
        self
    }

    pub fn with_allocation_failure_category(mut self, category: u32) -> Self {
        self.allocation_failure_category = category;
        self
    }

    /// Returns true if `record` is a fail-fast allocation failure raised under
    /// this config.
    pub fn is_allocation_failure(&self, record: &ExceptionRecord) -> bool {
        record.is_allocation_failure_for(self.allocation_failure_category)
    }
}
