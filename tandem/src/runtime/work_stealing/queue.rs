use crate::runtime::task::Job;

use parking_lot::Mutex;
use std::collections::VecDeque;

/// A per-worker local job queue.
///
/// `LocalQueue` stores jobs submitted from inside a worker thread.
/// The owning worker pushes and pops at the back of the queue (LIFO),
/// which keeps freshly spawned nested work hot in cache.
///
/// Other workers may steal jobs from the front of the queue (FIFO),
/// enabling work-stealing and load balancing across the pool.
pub(crate) struct LocalQueue {
    /// Inner deque protected by a mutex.
    inner: Mutex<VecDeque<Job>>,
}

impl LocalQueue {
    /// Creates an empty local job queue.
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Pushes a job onto the back of the local queue.
    pub(crate) fn push(&self, job: Job) {
        self.inner.lock().push_back(job);
    }

    /// Pops a job from the back of the local queue.
    pub(crate) fn pop(&self) -> Option<Job> {
        self.inner.lock().pop_back()
    }

    /// Steals a job from the front of the local queue.
    ///
    /// Intended to be used by other worker threads.
    pub(crate) fn steal(&self) -> Option<Job> {
        self.inner.lock().pop_front()
    }

    /// Removes every queued job.
    pub(crate) fn drain(&self) -> Vec<Job> {
        self.inner.lock().drain(..).collect()
    }
}
