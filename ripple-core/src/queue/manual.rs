//! Hand-pumped task queue.
//!
//! Gives tests (and embedders with their own loop) explicit control over
//! tick boundaries: nothing runs until the owner pumps the queue.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::{Task, TaskQueue};

/// A FIFO task queue that runs tasks only when explicitly pumped.
///
/// # Example
///
/// ```
/// use ripple_core::queue::{ManualQueue, TaskQueue};
///
/// let queue = ManualQueue::new();
/// queue.post(Box::new(|| println!("deferred")));
/// assert_eq!(queue.len(), 1);
///
/// queue.run_until_idle();
/// assert!(queue.is_empty());
/// ```
pub struct ManualQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl ManualQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
        }
    }

    /// Run the oldest pending task, if any. Returns whether one ran.
    ///
    /// The task runs outside the queue lock, so it may post further tasks.
    pub fn run_one(&self) -> bool {
        let task = self.tasks.lock().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, including tasks posted while
    /// draining. Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether the queue has no pending tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl Default for ManualQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue for ManualQueue {
    fn post(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }
}
