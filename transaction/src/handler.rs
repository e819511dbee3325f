//! Lifecycle handlers bound to a transaction at creation.

use std::fmt;

use crate::context::Transaction;

/// Callbacks invoked by a transaction's creation point.
///
/// `on_start` runs before the body. Exactly one of `on_normal_stop` and
/// `on_abort` runs when the transaction ends, followed by `on_end`, and only
/// then are the transaction's resources released.
pub trait TransactionHandler {
    /// Called before the body runs.
    fn on_start(&mut self, _tx: &Transaction) {}

    /// Called when the body completed or finished explicitly.
    fn on_normal_stop(&mut self, tx: &Transaction);

    /// Called when an exception was raised; `tx.pending_exception()` holds it.
    fn on_abort(&mut self, tx: &Transaction);

    /// Called after either of the above.
    fn on_end(&mut self, _tx: &Transaction) {}
}

impl<H: TransactionHandler + ?Sized> TransactionHandler for &mut H {
    fn on_start(&mut self, tx: &Transaction) {
        (**self).on_start(tx)
    }

    fn on_normal_stop(&mut self, tx: &Transaction) {
        (**self).on_normal_stop(tx)
    }

    fn on_abort(&mut self, tx: &Transaction) {
        (**self).on_abort(tx)
    }

    fn on_end(&mut self, tx: &Transaction) {
        (**self).on_end(tx)
    }
}

/// Handlers that ignore every event.
impl TransactionHandler for () {
    fn on_normal_stop(&mut self, _tx: &Transaction) {}

    fn on_abort(&mut self, _tx: &Transaction) {}
}

type Hook<'h> = Box<dyn FnMut(&Transaction) + 'h>;

/// A handler bundle built from closures. Missing hooks do nothing.
///
/// ```ignore
/// let mut aborted = 0;
/// let handlers = Handlers::new()
///     .with_abort(|tx| {
///         aborted += 1;
///         eprintln!("{}", tx.pending_exception().unwrap());
///     });
/// ```
#[derive(Default)]
pub struct Handlers<'h> {
    start: Option<Hook<'h>>,
    normal_stop: Option<Hook<'h>>,
    abort: Option<Hook<'h>>,
    end: Option<Hook<'h>>,
}

impl<'h> Handlers<'h> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start(mut self, hook: impl FnMut(&Transaction) + 'h) -> Self {
        self.start = Some(Box::new(hook));
        self
    }

    pub fn with_normal_stop(mut self, hook: impl FnMut(&Transaction) + 'h) -> Self {
        self.normal_stop = Some(Box::new(hook));
        self
    }

    pub fn with_abort(mut self, hook: impl FnMut(&Transaction) + 'h) -> Self {
        self.abort = Some(Box::new(hook));
        self
    }

    pub fn with_end(mut self, hook: impl FnMut(&Transaction) + 'h) -> Self {
        self.end = Some(Box::new(hook));
        self
    }
}

impl TransactionHandler for Handlers<'_> {
    fn on_start(&mut self, tx: &Transaction) {
        if let Some(hook) = self.start.as_mut() {
            hook(tx);
        }
    }

    fn on_normal_stop(&mut self, tx: &Transaction) {
        if let Some(hook) = self.normal_stop.as_mut() {
            hook(tx);
        }
    }

    fn on_abort(&mut self, tx: &Transaction) {
        if let Some(hook) = self.abort.as_mut() {
            hook(tx);
        }
    }

    fn on_end(&mut self, tx: &Transaction) {
        if let Some(hook) = self.end.as_mut() {
            hook(tx);
        }
    }
}

impl fmt::Debug for Handlers<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("start", &self.start.is_some())
            .field("normal_stop", &self.normal_stop.is_some())
            .field("abort", &self.abort.is_some())
            .field("end", &self.end.is_some())
            .finish()
    }
}
