//! Resource tracker for releasing everything a transaction acquired.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use txn_core::{ResourceId, TransactionId};

use crate::error::{TrackerError, TrackerResult};
use crate::resource::{ResourceKind, Tracked};

/// Order in which a tracker releases its resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOrder {
    /// Last acquired, first released.
    #[default]
    Reverse,
    /// First acquired, first released.
    Acquisition,
}

/// A registered resource.
struct ResourceEntry {
    id: ResourceId,
    kind: ResourceKind,
    release: Box<dyn FnOnce()>,
}

impl fmt::Debug for ResourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceEntry")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Tracks the resources owned by one transaction.
///
/// The collection only grows until teardown begins. Teardown drains it
/// exactly once; later teardowns are no-ops and later registrations fail.
#[derive(Debug)]
pub struct ResourceTracker {
    /// The transaction owning these resources.
    owner: TransactionId,
    /// Registered resources, in acquisition order.
    entries: Vec<ResourceEntry>,
    /// Release order policy.
    order: ReleaseOrder,
    /// Set once teardown began.
    torn_down: bool,
}

impl ResourceTracker {
    /// Create an empty tracker releasing in reverse acquisition order.
    pub fn new(owner: TransactionId) -> Self {
        Self::with_order(owner, ReleaseOrder::default())
    }

    /// Create an empty tracker with the given release order.
    pub fn with_order(owner: TransactionId, order: ReleaseOrder) -> Self {
        Self {
            owner,
            entries: Vec::new(),
            order,
            torn_down: false,
        }
    }

    pub fn owner(&self) -> TransactionId {
        self.owner
    }

    pub fn order(&self) -> ReleaseOrder {
        self.order
    }

    /// Number of resources awaiting release.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true once teardown began.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Ids of the resources awaiting release, in acquisition order.
    pub fn ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    /// Register a release action for a resource acquired elsewhere.
    pub fn register<F>(&mut self, kind: ResourceKind, release: F) -> TrackerResult<ResourceId>
    where
        F: FnOnce() + 'static,
    {
        if self.torn_down {
            return Err(TrackerError::torn_down(self.owner));
        }

        let id = ResourceId::next();
        trace!(owner = %self.owner, resource = %id, kind = %kind, "resource registered");
        self.entries.push(ResourceEntry {
            id,
            kind,
            release: Box::new(release),
        });
        Ok(id)
    }

    /// Take ownership of `value` and hand back a shared handle to it.
    ///
    /// At teardown the value is moved out of every handle and passed to
    /// `release`.
    pub fn track<R, F>(&mut self, kind: ResourceKind, value: R, release: F) -> TrackerResult<Tracked<R>>
    where
        R: 'static,
        F: FnOnce(R) + 'static,
    {
        let slot = Rc::new(RefCell::new(Some(value)));
        let held = Rc::clone(&slot);
        let id = self.register(kind, move || {
            let value = held.borrow_mut().take();
            if let Some(value) = value {
                release(value);
            }
        })?;
        Ok(Tracked::new(id, kind, slot))
    }

    /// Mark the tracker torn down and take its resources, ordered for release.
    ///
    /// Splitting the drain from the release lets a caller release outside any
    /// borrow of the structure holding the tracker.
    pub fn begin_teardown(&mut self) -> Teardown {
        if self.torn_down {
            return Teardown::empty(self.owner);
        }
        self.torn_down = true;

        let mut entries = std::mem::take(&mut self.entries);
        if self.order == ReleaseOrder::Reverse {
            entries.reverse();
        }
        Teardown {
            owner: self.owner,
            entries,
        }
    }

    /// Release every resource now. Returns how many were released.
    pub fn teardown(&mut self) -> usize {
        self.begin_teardown().run()
    }
}

impl Drop for ResourceTracker {
    fn drop(&mut self) {
        if !self.torn_down && !self.entries.is_empty() {
            warn!(
                owner = %self.owner,
                pending = self.entries.len(),
                "tracker dropped before teardown; releasing"
            );
            self.teardown();
        }
    }
}

/// Resources drained from a tracker, ready to be released.
#[must_use = "resources are only released by calling `run`"]
#[derive(Debug)]
pub struct Teardown {
    owner: TransactionId,
    entries: Vec<ResourceEntry>,
}

impl Teardown {
    fn empty(owner: TransactionId) -> Self {
        Self {
            owner,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every release action once. Returns how many ran.
    pub fn run(self) -> usize {
        let count = self.entries.len();
        for entry in self.entries {
            trace!(owner = %self.owner, resource = %entry.id, kind = %entry.kind, "resource released");
            (entry.release)();
        }
        if count > 0 {
            debug!(owner = %self.owner, released = count, "resources torn down");
        }
        count
    }
}
