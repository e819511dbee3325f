//! A resource source that records releases.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use txn_core::ResourceId;
use txn_transaction::{ResourceKind, Transaction, TxResult};

/// Hands out named resources and remembers the order they were released in.
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    acquired: Rc<Cell<usize>>,
    released: Rc<RefCell<Vec<String>>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource named `tag` with `tx`.
    pub fn record(&self, tx: &Transaction, tag: impl Into<String>) -> TxResult<ResourceId> {
        let tag = tag.into();
        let released = Rc::clone(&self.released);
        let id = tx.defer(ResourceKind::Custom("ledger"), move || {
            released.borrow_mut().push(tag);
        })?;
        self.acquired.set(self.acquired.get() + 1);
        Ok(id)
    }

    /// Tags in release order.
    pub fn released(&self) -> Vec<String> {
        self.released.borrow().clone()
    }

    pub fn acquired(&self) -> usize {
        self.acquired.get()
    }

    /// Resources acquired but not yet released. Releases beyond the acquired
    /// count show up as a negative balance.
    pub fn outstanding(&self) -> isize {
        self.acquired.get() as isize - self.released.borrow().len() as isize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_uncounted_release_goes_negative() {
        // GIVEN
        let ledger = Ledger::new();

        // WHEN
        ledger.released.borrow_mut().push("stray".to_string());

        // THEN
        assert_eq!(ledger.outstanding(), -1);
    }
}
