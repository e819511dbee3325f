//! Resource kinds and shared handles to tracked values.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use txn_core::ResourceId;

/// What a tracked resource is. Diagnostic only: the release action registered
/// with the resource decides what releasing it means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Memory,
    Socket,
    Thread,
    Timer,
    Listener,
    Custom(&'static str),
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Memory => write!(f, "memory"),
            ResourceKind::Socket => write!(f, "socket"),
            ResourceKind::Thread => write!(f, "thread"),
            ResourceKind::Timer => write!(f, "timer"),
            ResourceKind::Listener => write!(f, "listener"),
            ResourceKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// A handle to a value owned by a transaction.
///
/// Handles are cheap to clone. Once the owning transaction tears the resource
/// down, the value is gone and every accessor yields `None`.
pub struct Tracked<R> {
    id: ResourceId,
    kind: ResourceKind,
    slot: Rc<RefCell<Option<R>>>,
}

impl<R> Tracked<R> {
    pub(crate) fn new(id: ResourceId, kind: ResourceKind, slot: Rc<RefCell<Option<R>>>) -> Self {
        Self { id, kind, slot }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns true once the owning transaction released the value.
    pub fn is_released(&self) -> bool {
        self.slot.borrow().is_none()
    }

    /// Run `f` against the value, if it is still held.
    pub fn with<U>(&self, f: impl FnOnce(&R) -> U) -> Option<U> {
        self.slot.borrow().as_ref().map(f)
    }

    /// Run `f` against the value mutably, if it is still held.
    pub fn with_mut<U>(&self, f: impl FnOnce(&mut R) -> U) -> Option<U> {
        self.slot.borrow_mut().as_mut().map(f)
    }
}

impl<R> Clone for Tracked<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<R> fmt::Debug for Tracked<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("released", &self.is_released())
            .finish()
    }
}
