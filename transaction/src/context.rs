//! Transaction contexts and their creation points.
//!
//! A [`Transaction`] is created by [`Transaction::run`] (a root) or
//! [`Transaction::nest`] (a child). The constructor call is the creation
//! point: it runs `on_start`, then the body, then dispatches exactly one of
//! `on_normal_stop` / `on_abort`, then tears the transaction down.
//!
//! Contexts form a tree. A parent owns its live children; a child keeps a
//! non-owning back-reference to its parent. Contexts are `!Send`: they live on
//! the call stack that created them.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace, warn};
use txn_core::{Audience, ExceptionRecord, ResourceId, TransactionId};
use txn_tracker::{try_alloc_bytes, ResourceKind, ResourceTracker, Tracked};

use crate::config::TransactionConfig;
use crate::error::{TransactionError, TransactionResult};
use crate::handler::TransactionHandler;
use crate::unwind::{TransferStatus, TxResult, Unwind};

/// Lifecycle phase of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The body is running; no handler has been dispatched yet.
    Started,
    /// `on_normal_stop` was dispatched.
    StoppedNormally,
    /// `on_abort` was dispatched.
    Aborted,
}

/// How a transaction ended, as seen right after its creation point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The body returned (with its value) or finished early (without one).
    StoppedNormally(Option<T>),
    /// An exception was raised; the record is no longer pending anywhere.
    Aborted(ExceptionRecord),
}

impl<T> Outcome<T> {
    pub fn is_stopped(&self) -> bool {
        matches!(self, Outcome::StoppedNormally(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Outcome::Aborted(_))
    }

    pub fn phase(&self) -> Phase {
        match self {
            Outcome::StoppedNormally(_) => Phase::StoppedNormally,
            Outcome::Aborted(_) => Phase::Aborted,
        }
    }

    /// The body's value, if it ran to completion.
    pub fn value(self) -> Option<T> {
        match self {
            Outcome::StoppedNormally(value) => value,
            Outcome::Aborted(_) => None,
        }
    }

    /// The exception that aborted the transaction.
    pub fn exception(&self) -> Option<&ExceptionRecord> {
        match self {
            Outcome::StoppedNormally(_) => None,
            Outcome::Aborted(record) => Some(record),
        }
    }
}

/// First contract violation seen anywhere in one transaction tree.
type FaultSlot = Rc<RefCell<Option<TransactionError>>>;

#[derive(Debug)]
struct Context {
    id: TransactionId,
    /// Free-form debugging label.
    label: String,
    parent: Option<Weak<RefCell<Context>>>,
    depth: usize,
    /// Live children, in creation order.
    children: Vec<Rc<RefCell<Context>>>,
    tracker: ResourceTracker,
    pending: Option<ExceptionRecord>,
    phase: Phase,
    torn_down: bool,
    config: TransactionConfig,
}

impl Context {
    fn is_live(&self) -> bool {
        self.phase == Phase::Started && !self.torn_down
    }

    fn live_child(&self) -> Option<Rc<RefCell<Context>>> {
        self.children.iter().rev().find(|c| c.borrow().is_live()).cloned()
    }
}

enum Verdict<T> {
    Stop(Option<T>),
    /// Carries a copy of the pending record; the original stays pending
    /// until `on_abort` and `on_end` ran.
    Abort(ExceptionRecord),
}

/// A handle to a running transaction.
///
/// Pass `&Transaction` down to the code that runs inside it. Handles are not
/// clonable and cannot leave the body or handler they were lent to.
#[derive(Debug)]
pub struct Transaction {
    inner: Rc<RefCell<Context>>,
    faults: FaultSlot,
}

impl Transaction {
    // ========== Creation Points ==========

    /// Run `body` inside a new root transaction with the default config.
    ///
    /// Returns the outcome once the matching handler ran and every resource
    /// was released, or the first contract violation seen in the tree.
    pub fn run<H, T, F>(label: impl Into<String>, handler: H, body: F) -> TransactionResult<Outcome<T>>
    where
        H: TransactionHandler,
        F: FnOnce(&Transaction) -> TxResult<T>,
    {
        Self::run_with_config(TransactionConfig::default(), label, handler, body)
    }

    /// Run `body` inside a new root transaction.
    pub fn run_with_config<H, T, F>(
        config: TransactionConfig,
        label: impl Into<String>,
        handler: H,
        body: F,
    ) -> TransactionResult<Outcome<T>>
    where
        H: TransactionHandler,
        F: FnOnce(&Transaction) -> TxResult<T>,
    {
        let faults: FaultSlot = Rc::new(RefCell::new(None));
        let tx = Transaction::create(None, label.into(), config, faults);
        let result = tx.enter(handler, body);

        let fault = tx.faults.borrow_mut().take();
        match (result, fault) {
            (_, Some(violation)) => Err(violation),
            (Ok(outcome), None) => Ok(outcome),
            (Err(unwind), None) => Err(unwind.into_error(tx.id())),
        }
    }

    /// Run `body` inside a new child of this transaction.
    ///
    /// The child inherits this transaction's config. An `Err` means a contract
    /// violation is travelling to the root; return it with `?`.
    pub fn nest<H, T, F>(&self, label: impl Into<String>, handler: H, body: F) -> TxResult<Outcome<T>>
    where
        H: TransactionHandler,
        F: FnOnce(&Transaction) -> TxResult<T>,
    {
        self.ensure_live("nest")?;

        let config = self.inner.borrow().config.clone();
        let child = Transaction::create(Some(&self.inner), label.into(), config, Rc::clone(&self.faults));
        let result = child.enter(handler, body);

        self.inner
            .borrow_mut()
            .children
            .retain(|c| !Rc::ptr_eq(c, &child.inner));
        result
    }

    fn create(
        parent: Option<&Rc<RefCell<Context>>>,
        label: String,
        config: TransactionConfig,
        faults: FaultSlot,
    ) -> Self {
        let id = TransactionId::next();
        let depth = parent.map_or(0, |p| p.borrow().depth + 1);
        let inner = Rc::new(RefCell::new(Context {
            id,
            label,
            parent: parent.map(Rc::downgrade),
            depth,
            children: Vec::new(),
            tracker: ResourceTracker::with_order(id, config.release_order),
            pending: None,
            phase: Phase::Started,
            torn_down: false,
            config,
        }));
        if let Some(parent) = parent {
            parent.borrow_mut().children.push(Rc::clone(&inner));
        }
        Self { inner, faults }
    }

    /// The creation point: start, run the body, dispatch, tear down.
    fn enter<H, T, F>(&self, mut handler: H, body: F) -> TxResult<Outcome<T>>
    where
        H: TransactionHandler,
        F: FnOnce(&Transaction) -> TxResult<T>,
    {
        let id = self.id();
        debug!(tx = %id, label = %self.label(), depth = self.depth(), "transaction started");

        handler.on_start(self);
        let verdict = match self.pending_exception() {
            Some(record) => {
                debug!(tx = %id, "exception raised in on_start; body skipped");
                Verdict::Abort(record)
            }
            None => self.judge(body(self))?,
        };

        let outcome = match verdict {
            Verdict::Stop(value) => {
                self.inner.borrow_mut().phase = Phase::StoppedNormally;
                handler.on_normal_stop(self);
                handler.on_end(self);
                Outcome::StoppedNormally(value)
            }
            Verdict::Abort(record) => {
                self.inner.borrow_mut().phase = Phase::Aborted;
                handler.on_abort(self);
                handler.on_end(self);
                self.inner.borrow_mut().pending = None;
                Outcome::Aborted(record)
            }
        };

        let released = teardown_context(&self.inner);
        debug!(tx = %id, phase = ?outcome.phase(), released, "transaction ended");
        Ok(outcome)
    }

    /// Decide how the body's result ends this transaction. A fault or a
    /// transfer aimed elsewhere tears the transaction down and keeps travelling.
    fn judge<T>(&self, result: TxResult<T>) -> TxResult<Verdict<T>> {
        let id = self.id();
        match result {
            Ok(value) => match self.pending_exception() {
                Some(record) => {
                    warn!(tx = %id, "body returned after a raise; dispatching the pending exception");
                    Ok(Verdict::Abort(record))
                }
                None => Ok(Verdict::Stop(Some(value))),
            },
            Err(unwind) if unwind.target() == id && unwind.status() != TransferStatus::Fault => {
                Ok(match self.pending_exception() {
                    Some(record) => Verdict::Abort(record),
                    None => Verdict::Stop(None),
                })
            }
            Err(unwind) => {
                let unwind = if unwind.status() == TransferStatus::Fault {
                    unwind
                } else {
                    self.violation(TransactionError::StrayTransfer {
                        target: unwind.target(),
                        reached: id,
                    })
                };
                if let Some(stranded) = self.inner.borrow_mut().pending.take() {
                    warn!(tx = %id, exception = %stranded, "pending exception dropped by fault");
                }
                let released = teardown_context(&self.inner);
                debug!(tx = %id, released, "transaction discarded by fault");
                Err(unwind)
            }
        }
    }

    // ========== Control Transfer ==========

    /// Raise an exception on the transaction that owns the current call
    /// chain: this one, or its innermost live descendant.
    ///
    /// Return the result to the caller: `return Err(tx.raise(record))`.
    pub fn raise(&self, record: ExceptionRecord) -> Unwind {
        let owner = self.owner();
        let mut ctx = owner.borrow_mut();
        let id = ctx.id;

        if ctx.torn_down {
            drop(ctx);
            return self.violation(TransactionError::torn_down(id, "raise"));
        }
        if ctx.phase != Phase::Started {
            drop(ctx);
            return self.violation(TransactionError::already_ended(id, "raise"));
        }
        if let Some(pending) = &ctx.pending {
            let pending = pending.to_string();
            drop(ctx);
            return self.violation(TransactionError::exception_pending(id, pending));
        }

        let record = if ctx.config.capture_thread {
            record.with_current_thread()
        } else {
            record
        };
        debug!(
            tx = %id,
            kind = %record.kind(),
            category = record.category(),
            serial = record.serial_number(),
            "exception raised"
        );
        ctx.pending = Some(record);
        Unwind::abort(id)
    }

    /// Raise a sender exception (library code, unknown audience).
    pub fn raise_sender(&self, category: u32, description: impl Into<String>, detail: impl Into<String>) -> Unwind {
        self.raise(ExceptionRecord::sender(category, description, detail))
    }

    /// Raise a recipient exception (application code, known audience).
    pub fn raise_recipient(
        &self,
        audience: Audience,
        description: impl Into<String>,
        detail: impl Into<String>,
        solution: impl Into<String>,
    ) -> Unwind {
        self.raise(ExceptionRecord::recipient(audience, description, detail, solution))
    }

    /// End this transaction normally from anywhere in its own body.
    ///
    /// Must not be called from inside a live child transaction.
    pub fn finish(&self) -> Unwind {
        let ctx = self.inner.borrow();
        let id = ctx.id;
        let violation = if ctx.torn_down {
            Some(TransactionError::torn_down(id, "finish"))
        } else if ctx.phase != Phase::Started {
            Some(TransactionError::already_ended(id, "finish"))
        } else {
            ctx.live_child().map(|child| TransactionError::LiveChild {
                id,
                child: child.borrow().id,
            })
        };
        drop(ctx);

        match violation {
            Some(violation) => self.violation(violation),
            None => Unwind::stop(id),
        }
    }

    // ========== Resources ==========

    /// Allocate a resource with `alloc` and track it.
    ///
    /// When `alloc` yields nothing, a soft acquisition (`fail_fast == false`)
    /// returns `Ok(None)` and the transaction carries on. A fail-fast one
    /// raises a sender exception with the configured allocation failure
    /// category.
    pub fn acquire<R, A, F>(
        &self,
        kind: ResourceKind,
        fail_fast: bool,
        alloc: A,
        release: F,
    ) -> TxResult<Option<Tracked<R>>>
    where
        R: 'static,
        A: FnOnce() -> Option<R>,
        F: FnOnce(R) + 'static,
    {
        self.ensure_live("acquire")?;

        let Some(value) = alloc() else {
            if fail_fast {
                let (category, label) = {
                    let ctx = self.inner.borrow();
                    (ctx.config.allocation_failure_category, ctx.label.clone())
                };
                return Err(self.raise_sender(
                    category,
                    "tracked allocation failed",
                    format!("{} allocation in {} ({})", kind, label, self.id()),
                ));
            }
            trace!(tx = %self.id(), kind = %kind, "soft allocation failure");
            return Ok(None);
        };

        let tracked = self.inner.borrow_mut().tracker.track(kind, value, release);
        match tracked {
            Ok(tracked) => Ok(Some(tracked)),
            Err(e) => Err(self.violation(e.into())),
        }
    }

    /// Allocate a zeroed buffer of `len` bytes owned by this transaction.
    pub fn acquire_bytes(&self, len: usize, fail_fast: bool) -> TxResult<Option<Tracked<Vec<u8>>>> {
        self.acquire(ResourceKind::Memory, fail_fast, || try_alloc_bytes(len), drop)
    }

    /// Track a resource acquired elsewhere by the action that releases it.
    pub fn defer<F>(&self, kind: ResourceKind, release: F) -> TxResult<ResourceId>
    where
        F: FnOnce() + 'static,
    {
        self.ensure_live("defer")?;

        let registered = self.inner.borrow_mut().tracker.register(kind, release);
        registered.map_err(|e| self.violation(e.into()))
    }

    /// Release everything this transaction and its live children hold.
    ///
    /// Children go first, then this transaction's own resources. Returns the
    /// number of resources released; calling it again releases nothing.
    pub fn teardown(&self) -> usize {
        teardown_context(&self.inner)
    }

    // ========== Queries ==========

    pub fn id(&self) -> TransactionId {
        self.inner.borrow().id
    }

    pub fn label(&self) -> String {
        self.inner.borrow().label.clone()
    }

    pub fn phase(&self) -> Phase {
        self.inner.borrow().phase
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.borrow().torn_down
    }

    /// Nesting depth; a root is at depth 0.
    pub fn depth(&self) -> usize {
        self.inner.borrow().depth
    }

    pub fn parent_id(&self) -> Option<TransactionId> {
        let ctx = self.inner.borrow();
        let parent = ctx.parent.as_ref()?.upgrade()?;
        let id = parent.borrow().id;
        Some(id)
    }

    /// Ids of the live children, in creation order.
    pub fn child_ids(&self) -> Vec<TransactionId> {
        self.inner.borrow().children.iter().map(|c| c.borrow().id).collect()
    }

    /// Number of resources awaiting release.
    pub fn resource_count(&self) -> usize {
        self.inner.borrow().tracker.len()
    }

    /// Ids of the resources awaiting release, in acquisition order.
    pub fn resource_ids(&self) -> Vec<ResourceId> {
        self.inner.borrow().tracker.ids().collect()
    }

    /// The exception waiting for `on_abort`, if any.
    pub fn pending_exception(&self) -> Option<ExceptionRecord> {
        self.inner.borrow().pending.clone()
    }

    pub fn config(&self) -> TransactionConfig {
        self.inner.borrow().config.clone()
    }

    // ========== Internal Helpers ==========

    /// The innermost live transaction reachable from this one.
    fn owner(&self) -> Rc<RefCell<Context>> {
        let mut current = Rc::clone(&self.inner);
        loop {
            let next = current.borrow().live_child();
            match next {
                Some(child) => current = child,
                None => return current,
            }
        }
    }

    fn ensure_live(&self, operation: &'static str) -> TxResult<()> {
        let (id, torn_down, phase) = {
            let ctx = self.inner.borrow();
            (ctx.id, ctx.torn_down, ctx.phase)
        };
        if torn_down {
            return Err(self.violation(TransactionError::torn_down(id, operation)));
        }
        if phase != Phase::Started {
            return Err(self.violation(TransactionError::already_ended(id, operation)));
        }
        Ok(())
    }

    /// Report a contract violation and build the fault transfer carrying it.
    fn violation(&self, violation: TransactionError) -> Unwind {
        let id = self.id();
        error!(tx = %id, violation = %violation, "transaction contract violated");
        let mut slot = self.faults.borrow_mut();
        if slot.is_none() {
            *slot = Some(violation.clone());
        }
        Unwind::fault(id, violation)
    }
}

/// Tear down `ctx`: live children first (newest first), then its own
/// resources. No-op if already torn down.
fn teardown_context(ctx: &Rc<RefCell<Context>>) -> usize {
    let (children, pass) = {
        let mut c = ctx.borrow_mut();
        if c.torn_down {
            return 0;
        }
        c.torn_down = true;
        (c.children.clone(), c.tracker.begin_teardown())
    };

    let mut released: usize = children.iter().rev().map(teardown_context).sum();
    released += pass.run();
    released
}
