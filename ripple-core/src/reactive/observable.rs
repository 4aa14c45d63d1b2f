//! Observable implementation.
//!
//! An `Observable` is the leaf node of the dependency graph: a plain value
//! container whose value only changes through [`Observable::set`]. Derived
//! nodes subscribe to it and get invalidated when it changes.
//!
//! # How it works
//!
//! 1. `set` stores the new value and pushes an invalidation wave through
//!    the subscriber graph (stopping at nodes that are already stale).
//!
//! 2. `get` is a pure read. The validity flag exists for the benefit of
//!    derived nodes; for a leaf, a stale read simply revalidates.
//!
//! 3. Cloning an `Observable` is cheap and shares state, so a node can be
//!    handed to several consumers without ceremony.
//!
//! # Change detection
//!
//! `set` compares the incoming value against the cached one with
//! `PartialEq` and propagates only on inequality. Setting an equal value
//! is a complete no-op: no invalidation, no scheduled recomputation.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::node::{Node, NodeCore, NodeRef, ObservableId};
use super::Source;

/// A reactive value holding a value of type `T`.
///
/// # Example
///
/// ```
/// use ripple_core::reactive::Observable;
///
/// let count = Observable::new(0);
/// assert_eq!(count.get(), 0);
///
/// // Updating notifies subscribers (here there are none).
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<ObservableInner<T>>,
}

pub(crate) struct ObservableInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    core: NodeCore,
    weak: Weak<ObservableInner<T>>,
    value: RwLock<T>,
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new observable with the given initial value.
    ///
    /// The node starts stale; the first read revalidates it.
    pub fn new(value: T) -> Self {
        let inner = Arc::new_cyclic(|weak| ObservableInner {
            core: NodeCore::new(),
            weak: weak.clone(),
            value: RwLock::new(value),
        });
        Self { inner }
    }

    /// Get the observable's unique ID.
    pub fn id(&self) -> ObservableId {
        self.inner.core.id()
    }

    /// Get the current value.
    ///
    /// A pure read: it never triggers recomputation elsewhere in the graph.
    pub fn get(&self) -> T {
        self.inner.get_value()
    }

    /// Set a new value and invalidate subscribers.
    ///
    /// A no-op if `value` equals the current value.
    pub fn set(&self, value: T) {
        self.inner.set_value(value);
    }

    /// Update the value using a function.
    ///
    /// This is useful for updates that depend on the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.inner.value.read();
            f(&*guard)
        };
        self.set(new_value);
    }

    /// Mark this node and all transitive subscribers stale without
    /// changing the value.
    pub fn invalidate(&self) {
        Node::invalidate(&*self.inner, None);
    }

    /// Add `sub` as a subscriber of this observable.
    pub fn subscribe(&self, sub: &dyn Node) {
        Node::subscribe(&*self.inner, sub.node_ref());
    }

    /// Remove `sub` from this observable's subscribers.
    pub fn unsubscribe(&self, sub: &dyn Node) {
        Node::unsubscribe(&*self.inner, sub.id());
    }

    /// Whether any subscriber is attached.
    pub fn is_subscribed(&self) -> bool {
        self.inner.core.has_subscribers()
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.core.subscriber_count()
    }

    pub(crate) fn inner_source(&self) -> Arc<dyn Source<T>> {
        self.inner.clone()
    }
}

impl<T> ObservableInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn get_value(&self) -> T {
        // Leaf node: the cached value *is* the value, so a read revalidates.
        if !self.core.is_valid() {
            self.core.set_valid(true);
        }
        self.value.read().clone()
    }

    fn set_value(&self, value: T) {
        let changed = {
            let mut current = self.value.write();
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        };

        // The write lock is released before propagation so subscriber
        // callbacks can read the node freely.
        if changed {
            Node::invalidate(self, None);
        }
    }
}

impl<T> Node for ObservableInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn id(&self) -> ObservableId {
        self.core.id()
    }

    fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.core.id(), self.weak.clone())
    }

    fn invalidate(&self, _source: Option<&NodeRef>) {
        self.core.propagate_invalidate(&self.node_ref());
    }

    fn refresh(&self) {
        let _ = self.get_value();
    }

    fn subscribe(&self, sub: NodeRef) {
        // Leaf nodes have no upstream inputs, so the first-subscriber
        // transition has nothing to switch on.
        let _ = self.core.add_subscriber(sub);
    }

    fn unsubscribe(&self, sub: ObservableId) {
        let _ = self.core.remove_subscriber(sub);
    }

    fn is_subscribed(&self) -> bool {
        self.core.has_subscribers()
    }
}

impl<T> Source<T> for ObservableInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn get(&self) -> T {
        self.get_value()
    }
}

impl<T> Node for Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn id(&self) -> ObservableId {
        self.inner.id()
    }

    fn node_ref(&self) -> NodeRef {
        self.inner.node_ref()
    }

    fn invalidate(&self, source: Option<&NodeRef>) {
        Node::invalidate(&*self.inner, source);
    }

    fn refresh(&self) {
        self.inner.refresh();
    }

    fn subscribe(&self, sub: NodeRef) {
        Node::subscribe(&*self.inner, sub);
    }

    fn unsubscribe(&self, sub: ObservableId) {
        Node::unsubscribe(&*self.inner, sub);
    }

    fn is_subscribed(&self) -> bool {
        self.inner.is_subscribed()
    }
}

impl<T> Clone for Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Observable<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.id())
            .field("value", &*self.inner.value.read())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    /// A subscriber that counts how often it is invalidated.
    struct CountingNode {
        id: ObservableId,
        weak: Weak<CountingNode>,
        hits: AtomicI32,
    }

    impl CountingNode {
        fn new() -> Arc<Self> {
            Arc::new_cyclic(|weak| Self {
                id: ObservableId::new(),
                weak: weak.clone(),
                hits: AtomicI32::new(0),
            })
        }

        fn hits(&self) -> i32 {
            self.hits.load(Ordering::SeqCst)
        }
    }

    impl Node for CountingNode {
        fn id(&self) -> ObservableId {
            self.id
        }

        fn node_ref(&self) -> NodeRef {
            NodeRef::new(self.id, self.weak.clone())
        }

        fn invalidate(&self, _source: Option<&NodeRef>) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }

        fn refresh(&self) {}

        fn subscribe(&self, _sub: NodeRef) {}

        fn unsubscribe(&self, _sub: ObservableId) {}

        fn is_subscribed(&self) -> bool {
            false
        }
    }

    #[test]
    fn observable_get_and_set() {
        let ob = Observable::new(0);
        assert_eq!(ob.get(), 0);

        ob.set(42);
        assert_eq!(ob.get(), 42);
    }

    #[test]
    fn observable_update() {
        let ob = Observable::new(10);
        ob.update(|v| v + 5);
        assert_eq!(ob.get(), 15);
    }

    #[test]
    fn set_notifies_subscribers() {
        let ob = Observable::new(0);
        let sub = CountingNode::new();
        ob.subscribe(&*sub);

        // A fresh node is stale until first read; revalidate so the set
        // below has a wave to push.
        ob.get();
        assert_eq!(sub.hits(), 0);

        ob.set(1);
        assert_eq!(sub.hits(), 1);

        // The node is stale now; revalidate before the next set so the
        // wave propagates again.
        ob.get();
        ob.set(2);
        assert_eq!(sub.hits(), 2);
    }

    #[test]
    fn set_equal_value_does_not_propagate() {
        let ob = Observable::new(5);
        let sub = CountingNode::new();
        ob.subscribe(&*sub);

        ob.get();
        ob.set(5);
        assert_eq!(sub.hits(), 0);
    }

    #[test]
    fn invalidate_is_idempotent() {
        let ob = Observable::new(0);
        let sub = CountingNode::new();
        ob.subscribe(&*sub);

        ob.get();
        ob.invalidate();
        assert_eq!(sub.hits(), 1);

        // Already invalid: no re-traversal of subscribers.
        ob.invalidate();
        assert_eq!(sub.hits(), 1);
    }

    #[test]
    fn subscribe_and_unsubscribe_are_idempotent() {
        let ob = Observable::new(0);
        let sub = CountingNode::new();

        assert!(!ob.is_subscribed());
        ob.subscribe(&*sub);
        ob.subscribe(&*sub);
        assert_eq!(ob.subscriber_count(), 1);

        ob.unsubscribe(&*sub);
        assert!(!ob.is_subscribed());
        ob.unsubscribe(&*sub);
        assert!(!ob.is_subscribed());
    }

    #[test]
    fn dropped_subscriber_is_skipped() {
        let ob = Observable::new(0);
        let sub = CountingNode::new();
        ob.subscribe(&*sub);
        drop(sub);

        // Propagation must not fail on the dead entry.
        ob.get();
        ob.set(1);
        assert_eq!(ob.get(), 1);
    }

    #[test]
    fn observable_clone_shares_state() {
        let ob1 = Observable::new(0);
        let ob2 = ob1.clone();

        ob1.set(42);
        assert_eq!(ob2.get(), 42);

        ob2.set(100);
        assert_eq!(ob1.get(), 100);
    }

    #[test]
    fn observable_ids_are_unique() {
        let a = Observable::new(0);
        let b = Observable::new(0);
        assert_ne!(a.id(), b.id());
    }
}
