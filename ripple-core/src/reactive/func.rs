//! FuncObservable implementation.
//!
//! A `FuncObservable` is a derived value: a pure functor applied to an
//! ordered list of inputs, where each input is either a literal or another
//! node in the graph.
//!
//! # How it works
//!
//! 1. On first `get()` the node pulls current values from its dynamic
//!    inputs, applies the functor, and caches the result.
//!
//! 2. When an input changes, the invalidation wave marks this node stale;
//!    the next `get()` recomputes.
//!
//! 3. The node only subscribes to its inputs while it has at least one
//!    subscriber of its own. A derived value nobody observes keeps the
//!    whole upstream chain dormant (demand-driven activation).
//!
//! # Failure semantics
//!
//! The functor is expected to be pure and total. If it panics, the panic
//! propagates to whoever called `get()` and the node stays stale; a failed
//! computation never marks the node valid.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::node::{Node, NodeCore, NodeRef, ObservableId};
use super::observable::Observable;
use super::Source;

/// One functor parameter: a fixed value or a live node reference.
pub enum Input<T> {
    /// A constant slot; never triggers recomputation.
    Literal(T),

    /// A slot fed by another node; resolved with `get()` on demand.
    Dynamic(Arc<dyn Source<T>>),
}

impl<T> Input<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wrap a constant value.
    pub fn literal(value: T) -> Self {
        Input::Literal(value)
    }

    fn resolve(&self) -> T {
        match self {
            Input::Literal(value) => value.clone(),
            Input::Dynamic(source) => source.get(),
        }
    }

    fn attach(&self, sub: &NodeRef) {
        if let Input::Dynamic(source) = self {
            source.subscribe(sub.clone());
        }
    }

    fn detach(&self, sub: ObservableId) {
        if let Input::Dynamic(source) = self {
            source.unsubscribe(sub);
        }
    }
}

impl<T> From<&Observable<T>> for Input<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from(ob: &Observable<T>) -> Self {
        Input::Dynamic(ob.inner_source())
    }
}

impl<T> From<Observable<T>> for Input<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from(ob: Observable<T>) -> Self {
        Input::from(&ob)
    }
}

impl<T> From<&FuncObservable<T>> for Input<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from(func: &FuncObservable<T>) -> Self {
        Input::Dynamic(func.inner.clone())
    }
}

impl<T> From<FuncObservable<T>> for Input<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from(func: FuncObservable<T>) -> Self {
        Input::from(&func)
    }
}

/// The object-safe part of an input list: subscription management for the
/// dynamic slots.
pub trait InputSet: Send + Sync {
    /// Subscribe `sub` to every dynamic slot.
    fn attach(&self, sub: &NodeRef);

    /// Unsubscribe `sub` from every dynamic slot.
    fn detach(&self, sub: ObservableId);
}

/// An ordered list of functor parameters.
///
/// Implemented for a lone [`Input`] and for tuples of up to four inputs;
/// `Values` is the corresponding tuple of resolved values passed to the
/// functor.
pub trait Inputs: InputSet + 'static {
    type Values;

    /// Pull current values through every slot. Dynamic slots force
    /// upstream recomputation on demand; literal slots just clone.
    fn resolve(&self) -> Self::Values;
}

impl<A> InputSet for Input<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn attach(&self, sub: &NodeRef) {
        Input::attach(self, sub);
    }

    fn detach(&self, sub: ObservableId) {
        Input::detach(self, sub);
    }
}

impl<A> Inputs for Input<A>
where
    A: Clone + Send + Sync + 'static,
{
    type Values = A;

    fn resolve(&self) -> A {
        Input::resolve(self)
    }
}

macro_rules! tuple_inputs {
    ($(($T:ident, $idx:tt)),+) => {
        impl<$($T),+> InputSet for ($(Input<$T>,)+)
        where
            $($T: Clone + Send + Sync + 'static),+
        {
            fn attach(&self, sub: &NodeRef) {
                $(self.$idx.attach(sub);)+
            }

            fn detach(&self, sub: ObservableId) {
                $(self.$idx.detach(sub);)+
            }
        }

        impl<$($T),+> Inputs for ($(Input<$T>,)+)
        where
            $($T: Clone + Send + Sync + 'static),+
        {
            type Values = ($($T,)+);

            fn resolve(&self) -> Self::Values {
                ($(self.$idx.resolve(),)+)
            }
        }
    };
}

tuple_inputs!((A, 0));
tuple_inputs!((A, 0), (B, 1));
tuple_inputs!((A, 0), (B, 1), (C, 2));
tuple_inputs!((A, 0), (B, 1), (C, 2), (D, 3));

/// A derived node: `functor(inputs...)`, cached and lazily recomputed.
///
/// # Example
///
/// ```
/// use ripple_core::reactive::{FuncObservable, Input, Observable};
///
/// let base = Observable::new(4);
/// let doubled = FuncObservable::new(Input::from(&base), |x| x * 2);
///
/// assert_eq!(doubled.get(), 8);
/// ```
pub struct FuncObservable<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<FuncInner<T>>,
}

struct FuncInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    core: NodeCore,
    weak: Weak<FuncInner<T>>,

    /// The input list, erased to its subscription surface. The resolved
    /// values flow through `compute`, which shares the same list.
    inputs: Arc<dyn InputSet>,

    /// Resolves the inputs and applies the functor.
    compute: Box<dyn Fn() -> T + Send + Sync>,

    /// The cached value (None if never computed).
    value: RwLock<Option<T>>,

    /// Guards against reentrant recomputation, which would mean a cycle
    /// in the functor dependency edges.
    computing: AtomicBool,
}

/// Clears the `computing` flag even when the functor panics.
struct ComputeGuard<'a>(&'a AtomicBool);

impl Drop for ComputeGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T> FuncObservable<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a derived node from an input list and a functor.
    ///
    /// The functor does not run here; it runs on first access.
    pub fn new<I, F>(inputs: I, functor: F) -> Self
    where
        I: Inputs,
        F: Fn(I::Values) -> T + Send + Sync + 'static,
    {
        let inputs = Arc::new(inputs);
        let resolver = Arc::clone(&inputs);
        let inner = Arc::new_cyclic(|weak| FuncInner {
            core: NodeCore::new(),
            weak: weak.clone(),
            inputs,
            compute: Box::new(move || functor(resolver.resolve())),
            value: RwLock::new(None),
            computing: AtomicBool::new(false),
        });
        Self { inner }
    }

    /// Get the node's unique ID.
    pub fn id(&self) -> ObservableId {
        self.inner.core.id()
    }

    /// Get the current value, recomputing if stale.
    ///
    /// # Panics
    ///
    /// Panics if the functor panics, or if the functor dependency edges
    /// form a cycle (a node read during its own recomputation).
    pub fn get(&self) -> T {
        self.inner.get_value()
    }

    /// Check if the node has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Add `sub` as a subscriber. The first subscriber attaches this node
    /// to its inputs.
    pub fn subscribe(&self, sub: &dyn Node) {
        Node::subscribe(&*self.inner, sub.node_ref());
    }

    /// Remove `sub`. Losing the last subscriber detaches this node from
    /// its inputs, letting the upstream chain go dormant.
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
}

impl<T> FuncInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get_value(&self) -> T {
        if self.core.is_valid() {
            return self
                .value
                .read()
                .clone()
                .expect("valid node always holds a cached value");
        }

        if self.computing.swap(true, Ordering::AcqRel) {
            panic!(
                "dependency cycle: node {} was read during its own recomputation",
                self.core.id().raw()
            );
        }
        let _guard = ComputeGuard(&self.computing);

        // Compute first; the node is marked valid only on success.
        let value = (self.compute)();
        *self.value.write() = Some(value.clone());
        self.core.set_valid(true);
        value
    }

    fn on_off(&self, is_on: bool) {
        if is_on {
            self.inputs.attach(&self.node_ref());
        } else {
            self.inputs.detach(self.core.id());
        }

        // We are entering or leaving an unsubscribed state, in which we do
        // not receive invalidations, so the cached value cannot be trusted.
        self.core.set_valid(false);
    }
}

impl<T> Node for FuncInner<T>
where
    T: Clone + Send + Sync + 'static,
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
        if self.core.add_subscriber(sub) {
            self.on_off(true);
        }
    }

    fn unsubscribe(&self, sub: ObservableId) {
        if self.core.remove_subscriber(sub) {
            self.on_off(false);
        }
    }

    fn is_subscribed(&self) -> bool {
        self.core.has_subscribers()
    }
}

impl<T> Source<T> for FuncInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        self.get_value()
    }
}

impl<T> Drop for FuncInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        // Still attached to the inputs iff someone was subscribed to us.
        // Detach so the upstream subscriber lists do not accumulate dead
        // edges.
        if self.core.has_subscribers() {
            self.inputs.detach(self.core.id());
        }
    }
}

impl<T> Node for FuncObservable<T>
where
    T: Clone + Send + Sync + 'static,
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

impl<T> Clone for FuncObservable<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for FuncObservable<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuncObservable")
            .field("id", &self.id())
            .field("has_value", &self.has_value())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
