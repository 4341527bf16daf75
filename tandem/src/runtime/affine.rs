//! Affine runner.
//!
//! Work submitted here runs on one designated thread, the *affinity thread*
//! that owns render or UI state. This crate never runs that work by itself:
//! the owning render/update loop calls [`AffineRunner::process_queued`] once
//! per tick, and every job queued at that point runs to completion, in
//! submission order, before the call returns.
//!
//! If no loop ever calls `process_queued`, queued work never runs.

use crate::error::{Error, Result};
use crate::runtime::task::{Job, Task, TaskHandle};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use tracing::{debug, trace};

/// Identity of the affinity thread.
///
/// Unbound until the first drain, or until it is bound explicitly.
pub(crate) struct AffinityThread {
    owner: OnceLock<ThreadId>,
}

impl AffinityThread {
    fn new() -> Self {
        Self {
            owner: OnceLock::new(),
        }
    }

    /// Binds the current thread if no thread is bound yet, and returns the
    /// bound thread.
    pub(crate) fn bind(&self) -> ThreadId {
        *self.owner.get_or_init(|| {
            debug!(thread = ?thread::current().id(), "affinity thread bound");
            thread::current().id()
        })
    }

    /// Returns `true` if the current thread is the bound affinity thread.
    pub(crate) fn is_current(&self) -> bool {
        self.owner.get() == Some(&thread::current().id())
    }
}

/// Jobs waiting for the affinity thread, and whether new jobs are accepted.
struct Backlog {
    jobs: VecDeque<Job>,
    closed: bool,
}

/// Queues work for the affinity thread.
pub(crate) struct AffineRunner {
    backlog: Mutex<Backlog>,

    thread: Arc<AffinityThread>,

    /// Set while `process_queued` runs, to turn nested drains into no-ops.
    draining: AtomicBool,
}

impl AffineRunner {
    pub(crate) fn new() -> Self {
        Self {
            backlog: Mutex::new(Backlog {
                jobs: VecDeque::new(),
                closed: false,
            }),
            thread: Arc::new(AffinityThread::new()),
            draining: AtomicBool::new(false),
        }
    }

    /// Queues `work` for the next drain and returns its handle immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once the runner is closed.
    pub(crate) fn submit<F, T>(&self, work: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (job, handle) = Task::new(work, Some(self.thread.clone()));
        self.push(job)?;
        Ok(handle)
    }

    /// Queues an already built job.
    pub(crate) fn push(&self, job: Job) -> Result<()> {
        let mut backlog = self.backlog.lock();

        if backlog.closed {
            return Err(Error::ServiceShutdown);
        }

        backlog.jobs.push_back(job);
        trace!(pending = backlog.jobs.len(), "job queued for the affinity thread");

        Ok(())
    }

    /// Binds the calling thread as the affinity thread.
    ///
    /// Returns `false` if another thread is already bound.
    pub(crate) fn bind(&self) -> bool {
        self.thread.bind() == thread::current().id()
    }

    /// Number of jobs waiting for the next drain.
    pub(crate) fn pending(&self) -> usize {
        self.backlog.lock().jobs.len()
    }

    /// Runs every job queued before this call, in submission order.
    ///
    /// Jobs submitted while draining run on the next call. A call made from
    /// inside an affine job returns `0` without running anything.
    ///
    /// Returns the number of jobs that actually ran; cancelled jobs are
    /// skipped.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the affinity thread. The
    /// first thread to call this method becomes the affinity thread.
    pub(crate) fn process_queued(&self) -> usize {
        let owner = self.thread.bind();

        assert!(
            owner == thread::current().id(),
            "process_queued must be called on the affinity thread"
        );

        if self.draining.swap(true, Ordering::AcqRel) {
            return 0;
        }

        let batch = mem::take(&mut self.backlog.lock().jobs);

        let mut ran = 0;
        for job in batch {
            if job.run() {
                ran += 1;
            }
        }

        self.draining.store(false, Ordering::Release);

        if ran > 0 {
            trace!(ran, "affinity queue drained");
        }

        ran
    }

    /// Stops accepting jobs and returns the jobs that never ran.
    ///
    /// Dropping the returned jobs cancels their tasks.
    pub(crate) fn close(&self) -> Vec<Job> {
        let mut backlog = self.backlog.lock();
        backlog.closed = true;
        backlog.jobs.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_submission_order() {
        let runner = AffineRunner::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for name in ["a", "b", "c"] {
            let log = log.clone();
            runner.submit(move || log.lock().push(name)).unwrap();
        }

        assert_eq!(runner.pending(), 3);
        assert_eq!(runner.process_queued(), 3);
        assert_eq!(*log.lock(), ["a", "b", "c"]);
        assert_eq!(runner.pending(), 0);
    }

    #[test]
    fn first_drain_binds_the_thread() {
        let runner = AffineRunner::new();

        assert!(!runner.thread.is_current());
        runner.process_queued();
        assert!(runner.thread.is_current());
        assert!(runner.bind());
    }

    #[test]
    fn cancelled_jobs_are_not_counted() {
        let runner = AffineRunner::new();
        let skipped = runner.submit(|| 1).unwrap();
        let kept = runner.submit(|| 2).unwrap();

        assert!(skipped.cancel());
        assert_eq!(runner.process_queued(), 1);
        assert_eq!(kept.wait().unwrap(), 2);
    }

    #[test]
    fn close_rejects_and_returns_backlog() {
        let runner = AffineRunner::new();
        let queued = runner.submit(|| 1).unwrap();

        let leftover = runner.close();
        assert_eq!(leftover.len(), 1);
        drop(leftover);

        assert!(queued.wait().unwrap_err().is_cancelled());
        assert!(runner.submit(|| 2).unwrap_err().is_shutdown());
    }
}
