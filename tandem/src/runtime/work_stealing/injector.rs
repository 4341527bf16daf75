use crate::error::{Error, Result};
use crate::runtime::task::Job;

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Upper bound on how long an idle worker sleeps before looking for work
/// in the other workers' local queues again.
const PARK_TIMEOUT: Duration = Duration::from_millis(5);

/// Shared handle to the global job injector.
pub(crate) type InjectorHandle = Arc<Injector>;

/// Jobs waiting in the injector, and whether new jobs are still accepted.
struct Inbox {
    jobs: VecDeque<Job>,
    closed: bool,
}

/// Global job injector for the work-stealing pool.
///
/// The injector is the centralized queue where jobs submitted from outside
/// the pool are pushed before being picked up by worker threads.
///
/// It also coordinates worker parking and waking using a condition
/// variable, allowing workers to sleep when no work is available.
pub(crate) struct Injector {
    /// Queue holding globally injected jobs.
    inbox: Mutex<Inbox>,

    /// Condition variable used to wake parked workers.
    condvar: Condvar,

    /// Set when queued jobs must be dropped instead of run.
    aborted: AtomicBool,
}

impl Injector {
    /// Creates a new empty injector.
    pub(crate) fn new() -> Self {
        Injector {
            inbox: Mutex::new(Inbox {
                jobs: VecDeque::new(),
                closed: false,
            }),
            condvar: Condvar::new(),
            aborted: AtomicBool::new(false),
        }
    }

    /// Stops accepting jobs and wakes all parked workers.
    ///
    /// Jobs that are already queued are still handed out, so workers drain
    /// the queue before exiting.
    pub(crate) fn close(&self) {
        self.inbox.lock().closed = true;
        self.condvar.notify_all();
    }

    /// Stops accepting jobs and tells workers to exit without running the
    /// jobs that are still queued.
    pub(crate) fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        self.close();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inbox.lock().closed
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Pushes a new job into the global injector and wakes one parked worker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once the injector is closed. The
    /// rejected job is dropped, which cancels its task.
    pub(crate) fn push(&self, job: Job) -> Result<()> {
        {
            let mut inbox = self.inbox.lock();

            if inbox.closed {
                return Err(Error::ServiceShutdown);
            }

            inbox.jobs.push_back(job);
        }

        self.condvar.notify_one();
        Ok(())
    }

    /// Parks the current worker thread until work becomes available,
    /// the injector is closed, or the park timeout elapses.
    ///
    /// The timed wait makes idle workers periodically re-check the local
    /// queues of their peers, which do not signal the condition variable.
    pub(crate) fn park(&self) {
        let mut inbox = self.inbox.lock();

        if inbox.closed || !inbox.jobs.is_empty() {
            return;
        }

        self.condvar.wait_for(&mut inbox, PARK_TIMEOUT);
    }

    /// Steals a job from the global injector.
    ///
    /// Jobs are taken from the front of the queue.
    /// Returns `None` if no jobs are available or the pool was aborted.
    pub(crate) fn steal(&self) -> Option<Job> {
        if self.is_aborted() {
            return None;
        }

        self.inbox.lock().jobs.pop_front()
    }

    /// Removes every queued job.
    pub(crate) fn drain(&self) -> Vec<Job> {
        self.inbox.lock().jobs.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::task::Task;

    #[test]
    fn steal_is_fifo() {
        let injector = Injector::new();
        let (first, a) = Task::new(|| 'a', None);
        let (second, b) = Task::new(|| 'b', None);

        injector.push(first).unwrap();
        injector.push(second).unwrap();

        assert!(injector.steal().unwrap().run());
        assert!(a.is_done());
        assert!(!b.is_done());
    }

    #[test]
    fn closed_injector_rejects_and_cancels() {
        let injector = Injector::new();
        injector.close();

        let (job, handle) = Task::new(|| 1, None);
        assert!(injector.push(job).unwrap_err().is_shutdown());
        assert!(handle.wait().unwrap_err().is_cancelled());
    }

    #[test]
    fn aborted_injector_hands_out_nothing() {
        let injector = Injector::new();
        let (job, handle) = Task::new(|| 1, None);

        injector.push(job).unwrap();
        injector.abort();

        assert!(injector.steal().is_none());
        drop(injector.drain());
        assert!(handle.wait().unwrap_err().is_cancelled());
    }
}
