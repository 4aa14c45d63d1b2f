//! Tokio-backed task queue.
//!
//! Posts flow through an unbounded channel into a single drain task, so
//! they run strictly in FIFO order, one at a time, regardless of how many
//! worker threads the runtime has.

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::warn;

use super::{QueueError, Task, TaskQueue};

/// A task queue that runs posted closures on a tokio runtime.
///
/// # Example
///
/// ```
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use ripple_core::queue::{TaskQueue, TokioQueue};
///
/// let queue = TokioQueue::new().expect("inside a runtime");
/// queue.post(Box::new(|| println!("deferred")));
/// # });
/// ```
pub struct TokioQueue {
    sender: mpsc::UnboundedSender<Task>,
}

impl TokioQueue {
    /// Create a queue draining on the current thread's runtime.
    pub fn new() -> Result<Self, QueueError> {
        let handle = Handle::try_current().map_err(|_| QueueError::NoRuntime)?;
        Ok(Self::with_handle(&handle))
    }

    /// Create a queue draining on the given runtime handle.
    pub fn with_handle(handle: &Handle) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Task>();

        handle.spawn(async move {
            while let Some(task) = receiver.recv().await {
                task();
            }
        });

        Self { sender }
    }
}

impl TaskQueue for TokioQueue {
    fn post(&self, task: Task) {
        // Posting is modelled as infallible; after runtime shutdown the
        // deferred work is moot anyway.
        if self.sender.send(task).is_err() {
            warn!("task queue closed; dropping deferred task");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    /// Post a marker task and wait for it; FIFO ordering means every
    /// earlier task has run by the time it resolves.
    async fn drained(queue: &TokioQueue) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        queue.post(Box::new(move || {
            let _ = tx.send(());
        }));
        rx.await.expect("drain task dropped");
    }

    #[test]
    fn new_outside_runtime_fails() {
        let result = TokioQueue::new();
        assert!(matches!(result, Err(QueueError::NoRuntime)));
    }

    #[tokio::test]
    async fn tasks_run_in_fifo_order_exactly_once() {
        let queue = TokioQueue::new().expect("inside a runtime");
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for i in 0..5 {
            let log = log.clone();
            queue.post(Box::new(move || log.lock().push(i)));
        }

        drained(&queue).await;
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn reactive_graph_flushes_on_the_runtime() {
        use crate::reactive::{Activator, FuncObservable, Input, Observable};

        let queue = Arc::new(TokioQueue::new().expect("inside a runtime"));
        let activator = Activator::new(queue.clone());

        let base = Observable::new(1);
        let doubled = FuncObservable::new(Input::from(&base), |x| x * 2);
        activator.activate(&doubled);

        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        let _watch = activator.watch(Input::from(&doubled), move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);

        base.set(21);
        drained(&queue).await;
        // The first pass may invalidate the watch again; let any follow-up
        // pass settle before asserting.
        drained(&queue).await;

        assert_eq!(doubled.get(), 42);
        assert!(count.load(Ordering::SeqCst) >= 2);
    }
}
