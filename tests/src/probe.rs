//! A handler that records lifecycle events.

use txn_core::{ExceptionRecord, TransactionId};
use txn_transaction::{Transaction, TransactionHandler};

/// A recorded lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(TransactionId),
    NormalStop(TransactionId),
    /// The pending exception as the abort handler saw it.
    Abort(TransactionId, Option<ExceptionRecord>),
    End(TransactionId),
}

/// Records every event dispatched to it, in order.
#[derive(Debug, Default)]
pub struct Probe {
    events: Vec<Event>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn starts(&self) -> usize {
        self.count(|e| matches!(e, Event::Start(_)))
    }

    pub fn stops(&self) -> usize {
        self.count(|e| matches!(e, Event::NormalStop(_)))
    }

    pub fn aborts(&self) -> usize {
        self.count(|e| matches!(e, Event::Abort(..)))
    }

    pub fn ends(&self) -> usize {
        self.count(|e| matches!(e, Event::End(_)))
    }

    /// Exceptions observed by abort handlers.
    pub fn exceptions(&self) -> Vec<ExceptionRecord> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Abort(_, record) => record.clone(),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl TransactionHandler for Probe {
    fn on_start(&mut self, tx: &Transaction) {
        self.events.push(Event::Start(tx.id()));
    }

    fn on_normal_stop(&mut self, tx: &Transaction) {
        self.events.push(Event::NormalStop(tx.id()));
    }

    fn on_abort(&mut self, tx: &Transaction) {
        self.events.push(Event::Abort(tx.id(), tx.pending_exception()));
    }

    fn on_end(&mut self, tx: &Transaction) {
        self.events.push(Event::End(tx.id()));
    }
}
