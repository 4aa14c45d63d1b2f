//! Activator implementation.
//!
//! The activator is the scheduler of the graph. It subscribes itself to
//! the nodes the application wants kept live, collects the nodes that go
//! stale, and recomputes them in one deferred pass per event-loop tick.
//!
//! # How it works
//!
//! 1. `activate` subscribes the activator to a node and pulls its value
//!    once. The node now always has at least one subscriber, so its
//!    demand-driven chain stays attached.
//!
//! 2. When an invalidation wave reaches the activator, the source node is
//!    added to the pending set. The first arrival per tick posts a single
//!    zero-delay flush task to the queue; later arrivals merge into the
//!    same set.
//!
//! 3. The flush snapshots and clears the pending set before refreshing
//!    anything, so invalidations produced *during* the pass accumulate
//!    into a fresh set and get their own pass.
//!
//! This coalesces a burst of synchronous `set` calls into one
//! recomputation wave and never recomputes reentrantly within a pass.
//!
//! # Failure isolation
//!
//! A panicking node must not abort the rest of the wave or wedge the
//! scheduled flag, so each refresh runs under `catch_unwind` and failures
//! are logged.

use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, error, trace};

use super::func::{FuncObservable, Inputs};
use super::node::{Node, NodeCore, NodeRef, ObservableId};
use crate::queue::TaskQueue;

/// The deferred-batch scheduler for a reactive graph.
///
/// Unlike a process-wide singleton, an `Activator` is constructed
/// explicitly and handed to whoever builds the graph; tests can run
/// several independent ones. Cloning is cheap and shares state.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use ripple_core::queue::ManualQueue;
/// use ripple_core::reactive::{Activator, FuncObservable, Input, Observable};
///
/// let queue = Arc::new(ManualQueue::new());
/// let activator = Activator::new(queue.clone());
///
/// let celsius = Observable::new(0);
/// let fahrenheit = FuncObservable::new(Input::from(&celsius), |c| c * 9 / 5 + 32);
/// activator.activate(&fahrenheit);
///
/// celsius.set(100);
/// queue.run_until_idle();
/// assert_eq!(fahrenheit.get(), 212);
/// ```
pub struct Activator {
    inner: Arc<ActivatorInner>,
}

struct ActivatorInner {
    core: NodeCore,
    weak: Weak<ActivatorInner>,
    queue: Arc<dyn TaskQueue>,
    batch: Mutex<Batch>,
}

/// Scheduling state: at most one flush task may be outstanding.
#[derive(Default)]
struct Batch {
    scheduled: bool,

    /// Nodes invalidated since the last pass began, in arrival order,
    /// deduplicated by ID.
    pending: IndexMap<ObservableId, Weak<dyn Node>>,
}

impl Activator {
    /// Create an activator that defers its recomputation passes onto
    /// `queue`.
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        let inner = Arc::new_cyclic(|weak| ActivatorInner {
            core: NodeCore::new(),
            weak: weak.clone(),
            queue,
            batch: Mutex::new(Batch::default()),
        });
        Self { inner }
    }

    /// Get the activator's unique ID.
    pub fn id(&self) -> ObservableId {
        self.inner.core.id()
    }

    /// Force a node permanently live.
    ///
    /// Subscribes the activator to `node` and pulls its value once. From
    /// here on the node always has at least one subscriber, so it keeps
    /// receiving invalidations and gets refreshed by the deferred passes.
    /// Returns the node for chaining.
    pub fn activate<'a, N>(&self, node: &'a N) -> &'a N
    where
        N: Node + ?Sized,
    {
        node.subscribe(self.inner.node_ref());
        node.refresh();
        debug!(node = node.id().raw(), "activated");
        node
    }

    /// Run `observer` with freshly resolved input values whenever any
    /// dynamic input changes.
    ///
    /// The observer is wrapped in a [`FuncObservable`] with no meaningful
    /// output and activated. The returned handle keeps the watch alive;
    /// dropping it retires the watch.
    pub fn watch<I, F>(&self, inputs: I, observer: F) -> FuncObservable<()>
    where
        I: Inputs,
        F: Fn(I::Values) + Send + Sync + 'static,
    {
        let func = FuncObservable::new(inputs, move |values| observer(values));
        self.activate(&func);
        func
    }

    /// Whether a flush task is currently outstanding.
    pub fn is_scheduled(&self) -> bool {
        self.inner.batch.lock().scheduled
    }
}

impl ActivatorInner {
    /// Run one recomputation pass.
    ///
    /// The scheduling state is reset and the pending set is taken *before*
    /// any node runs, so invalidations caused by the refreshes below
    /// accumulate into a fresh set and schedule their own pass.
    fn flush(&self) {
        let pending = {
            let mut batch = self.batch.lock();
            batch.scheduled = false;
            std::mem::take(&mut batch.pending)
        };

        trace!(nodes = pending.len(), "recomputation pass");

        for (id, node) in pending {
            // A node dropped between invalidation and the pass is skipped.
            let Some(node) = node.upgrade() else {
                continue;
            };
            if panic::catch_unwind(AssertUnwindSafe(|| node.refresh())).is_err() {
                error!(
                    node = id.raw(),
                    "recomputation panicked; continuing with the rest of the pass"
                );
            }
        }
    }
}

impl Node for ActivatorInner {
    fn id(&self) -> ObservableId {
        self.core.id()
    }

    fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.core.id(), self.weak.clone())
    }

    /// Collect the stale source and make sure one flush is scheduled.
    fn invalidate(&self, source: Option<&NodeRef>) {
        let post = {
            let mut batch = self.batch.lock();
            if let Some(src) = source {
                batch.pending.insert(src.id(), src.weak());
            }
            if batch.scheduled {
                false
            } else {
                batch.scheduled = true;
                true
            }
        };

        if post {
            let weak = self.weak.clone();
            self.queue.post(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.flush();
                }
            }));
        }
    }

    fn refresh(&self) {}

    fn subscribe(&self, sub: NodeRef) {
        let _ = self.core.add_subscriber(sub);
    }

    fn unsubscribe(&self, sub: ObservableId) {
        let _ = self.core.remove_subscriber(sub);
    }

    fn is_subscribed(&self) -> bool {
        self.core.has_subscribers()
    }
}

impl Clone for Activator {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Debug for Activator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let batch = self.inner.batch.lock();
        f.debug_struct("Activator")
            .field("id", &self.inner.core.id())
            .field("scheduled", &batch.scheduled)
            .field("pending", &batch.pending.len())
            .finish()
    }
}
