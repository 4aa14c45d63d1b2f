//! Ripple Core
//!
//! This crate implements a minimal lazy, push-invalidation dataflow graph
//! with deferred batch recomputation:
//!
//! - Reactive nodes ([`reactive::Observable`], [`reactive::FuncObservable`])
//! - Invalidation propagation with demand-driven activation
//! - A scheduler ([`reactive::Activator`]) that coalesces invalidations
//!   into one recomputation pass per event-loop tick
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: the dependency graph and its scheduler
//! - `queue`: the event-loop primitive the scheduler defers onto
//!
//! Mutations (`set`) push an invalidation wave through the subscriber
//! graph; reads (`get`) lazily pull fresh values back through the inputs.
//! The activator sits at the downstream edge of the graph and turns waves
//! into batched recomputation.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ripple_core::queue::ManualQueue;
//! use ripple_core::reactive::{Activator, FuncObservable, Input, Observable};
//!
//! let queue = Arc::new(ManualQueue::new());
//! let activator = Activator::new(queue.clone());
//!
//! let count = Observable::new(0);
//! let doubled = FuncObservable::new(Input::from(&count), |x| x * 2);
//! activator.activate(&doubled);
//!
//! count.set(5);
//! queue.run_until_idle(); // one tick of the event loop
//! assert_eq!(doubled.get(), 10);
//! ```
//!
//! # Threading model
//!
//! The graph is single-threaded and cooperative: all mutation is expected
//! to happen on one event-loop thread, and the only asynchrony is the
//! deferred recomputation pass picked up on a later tick of that same
//! loop. The types are `Send + Sync` so they can be handed across threads
//! before the loop starts, but concurrent mutation is not part of the
//! design.

pub mod queue;
pub mod reactive;
