//! Reactive primitives.
//!
//! This module implements a small lazy dataflow graph: observables,
//! derived func-observables, and the activator that batches recomputation.
//!
//! # Concepts
//!
//! ## Observables
//!
//! An [`Observable`] is a container for mutable state. Derived nodes
//! subscribe to it; when its value changes, an invalidation wave marks
//! every transitive subscriber stale. The wave stops at nodes that are
//! already stale, which keeps propagation idempotent.
//!
//! ## FuncObservables
//!
//! A [`FuncObservable`] is a derived value: a pure functor over an
//! explicit, ordered list of inputs (literals or other nodes). It is lazy
//! and memoized, and it only stays attached to its inputs while someone
//! is subscribed to it.
//!
//! ## The Activator
//!
//! An [`Activator`] keeps chosen nodes permanently live and defers their
//! recomputation onto an event-loop queue, coalescing every invalidation
//! that arrives within one tick into a single recomputation pass.
//!
//! # Implementation notes
//!
//! Dependencies are explicit: a derived node names its inputs up front
//! rather than discovering them through a tracking context. That keeps
//! the graph static per node and makes the subscription lifecycle (the
//! first-subscriber/last-subscriber transitions) the only activation
//! mechanism.
//!
//! Functor dependency edges must be acyclic. Invalidation degrades
//! gracefully on diamonds, but a cyclic `get()` chain is a programming
//! error and is reported by panicking.

mod activator;
mod func;
mod node;
mod observable;

pub use activator::Activator;
pub use func::{FuncObservable, Input, InputSet, Inputs};
pub use node::{Node, NodeRef, ObservableId};
pub use observable::Observable;

/// A node that yields values of type `T` when read.
///
/// Implemented by both source observables and derived func-observables,
/// which is what lets derived nodes feed other derived nodes.
pub trait Source<T>: Node {
    /// Get the current value, recomputing if stale.
    fn get(&self) -> T;
}
