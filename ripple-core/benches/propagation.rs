//! Benchmarks for invalidation propagation and batched recomputation.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ripple_core::queue::ManualQueue;
use ripple_core::reactive::{Activator, FuncObservable, Input, Observable};

/// Build a linear chain of derived nodes and measure one full
/// set / flush / read cycle through it.
fn chain_propagation(c: &mut Criterion) {
    let queue = Arc::new(ManualQueue::new());
    let activator = Activator::new(queue.clone());

    let root = Observable::new(0u64);
    let mut chain = Vec::with_capacity(64);
    chain.push(FuncObservable::new(Input::from(&root), |x| x + 1));
    for i in 1..64 {
        let prev = chain[i - 1].clone();
        chain.push(FuncObservable::new(Input::from(&prev), |x| x + 1));
    }
    let tail = chain.last().expect("chain is non-empty").clone();
    activator.activate(&tail);

    let mut value = 0u64;
    c.bench_function("chain_64_set_flush_get", |b| {
        b.iter(|| {
            value += 1;
            root.set(value);
            queue.run_until_idle();
            black_box(tail.get())
        })
    });
}

/// Measure coalescing many root changes into a single pass.
fn burst_coalescing(c: &mut Criterion) {
    let queue = Arc::new(ManualQueue::new());
    let activator = Activator::new(queue.clone());

    let roots: Vec<_> = (0..32).map(|i| Observable::new(i as u64)).collect();
    let derived: Vec<_> = roots
        .iter()
        .map(|root| FuncObservable::new(Input::from(root), |x| x * 2))
        .collect();
    for node in &derived {
        activator.activate(node);
    }

    let mut value = 0u64;
    c.bench_function("burst_32_roots_one_pass", |b| {
        b.iter(|| {
            value += 1;
            for root in &roots {
                root.set(value);
            }
            queue.run_until_idle();
            black_box(derived.last().map(|d| d.get()))
        })
    });
}

criterion_group!(benches, chain_propagation, burst_coalescing);
criterion_main!(benches);
