//! Graph node plumbing.
//!
//! Every reactive value in the graph, whatever its concrete type, presents
//! the same type-erased surface: it can be invalidated, refreshed, and
//! subscribed to. The [`Node`] trait captures that surface, and [`NodeCore`]
//! holds the state every node shares: the validity flag and the subscriber
//! list.
//!
//! # Ownership
//!
//! Nodes never own their subscribers. A subscriber list holds [`NodeRef`]s,
//! which carry a `Weak` pointer; a node with no external strong references
//! is collected normally, and propagation simply skips entries that fail to
//! upgrade. Ownership of nodes stays entirely with the application.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

/// Unique identifier for a node in the dependency graph.
///
/// Subscriber lists and the scheduler's pending set are keyed by this ID,
/// which is what makes subscribe/unsubscribe idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservableId(u64);

impl ObservableId {
    /// Generate a new unique ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObservableId {
    fn default() -> Self {
        Self::new()
    }
}

/// A non-owning, identity-carrying reference to a node.
///
/// This is the currency of the graph: subscriber lists store these, and
/// invalidation passes them along so downstream nodes know which upstream
/// node changed.
#[derive(Clone)]
pub struct NodeRef {
    id: ObservableId,
    node: Weak<dyn Node>,
}

impl NodeRef {
    pub fn new(id: ObservableId, node: Weak<dyn Node>) -> Self {
        Self { id, node }
    }

    /// The ID of the referenced node.
    pub fn id(&self) -> ObservableId {
        self.id
    }

    /// Try to obtain a strong reference to the node.
    ///
    /// Returns `None` if the node has been dropped.
    pub fn upgrade(&self) -> Option<Arc<dyn Node>> {
        self.node.upgrade()
    }

    pub(crate) fn weak(&self) -> Weak<dyn Node> {
        self.node.clone()
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("alive", &(self.node.strong_count() > 0))
            .finish()
    }
}

/// The type-erased surface of a reactive node.
///
/// Concrete node types ([`Observable`], [`FuncObservable`], [`Activator`])
/// all implement this, which lets heterogeneously typed nodes live in the
/// same subscriber lists and pending sets.
///
/// [`Observable`]: super::Observable
/// [`FuncObservable`]: super::FuncObservable
/// [`Activator`]: super::Activator
pub trait Node: Send + Sync {
    /// The node's unique ID.
    fn id(&self) -> ObservableId;

    /// A weak reference to this node, suitable for subscriber lists.
    fn node_ref(&self) -> NodeRef;

    /// Mark this node and all transitive subscribers as stale.
    ///
    /// `source` is the upstream node whose change triggered the call, or
    /// `None` for a direct external invalidation. Invalidating an
    /// already-invalid node is a no-op; that short-circuit is what keeps
    /// propagation idempotent across diamond-shaped graphs.
    fn invalidate(&self, source: Option<&NodeRef>);

    /// Recompute the node's value if it is stale.
    ///
    /// This is the type-erased form of `get()`; the scheduler calls it on
    /// collected nodes without knowing their value types.
    fn refresh(&self);

    /// Add a subscriber. Adding a node that is already subscribed is a
    /// no-op.
    fn subscribe(&self, sub: NodeRef);

    /// Remove a subscriber. Removing a node that is not subscribed is a
    /// no-op.
    fn unsubscribe(&self, sub: ObservableId);

    /// Whether any subscriber is currently attached.
    fn is_subscribed(&self) -> bool;
}

/// State shared by every node type: the validity flag and subscriber list.
///
/// The methods return transition information (`0 -> 1`, `1 -> 0`) so the
/// owning node can drive its activation hook; `NodeCore` itself has no
/// notion of what activation means.
pub(crate) struct NodeCore {
    id: ObservableId,

    /// True iff the cached value reflects current inputs.
    valid: AtomicBool,

    /// Subscribers, duplicate-free by ID. Most nodes have at most a couple.
    subs: Mutex<SmallVec<[NodeRef; 2]>>,
}

impl NodeCore {
    pub(crate) fn new() -> Self {
        Self {
            id: ObservableId::new(),
            valid: AtomicBool::new(false),
            subs: Mutex::new(SmallVec::new()),
        }
    }

    pub(crate) fn id(&self) -> ObservableId {
        self.id
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub(crate) fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::Release);
    }

    /// Invalidate all subscribers, then clear the validity flag.
    ///
    /// No-op when already invalid. Subscribers are notified before the flag
    /// is cleared; subclass-like nodes may read the source's validity from
    /// their own `invalidate`. The list is snapshotted first so subscriber
    /// callbacks never run under the lock.
    pub(crate) fn propagate_invalidate(&self, self_ref: &NodeRef) {
        if !self.is_valid() {
            return;
        }

        let subs: SmallVec<[NodeRef; 2]> = self.subs.lock().clone();
        for sub in &subs {
            if let Some(node) = sub.upgrade() {
                node.invalidate(Some(self_ref));
            }
        }

        self.set_valid(false);
    }

    /// Add a subscriber. Returns true on the 0 -> 1 transition.
    pub(crate) fn add_subscriber(&self, sub: NodeRef) -> bool {
        let mut subs = self.subs.lock();
        if subs.iter().any(|s| s.id() == sub.id()) {
            return false;
        }
        let was_empty = subs.is_empty();
        subs.push(sub);
        was_empty
    }

    /// Remove a subscriber by ID. Returns true on the 1 -> 0 transition.
    pub(crate) fn remove_subscriber(&self, id: ObservableId) -> bool {
        let mut subs = self.subs.lock();
        let len_before = subs.len();
        subs.retain(|s| s.id() != id);
        len_before > 0 && subs.is_empty()
    }

    pub(crate) fn has_subscribers(&self) -> bool {
        !self.subs.lock().is_empty()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subs.lock().len()
    }
}
