use super::TaskHandle;
use super::state::{CANCELLED, COMPLETED, FAILED, PENDING, RUNNING};
use crate::error::Failure;
use crate::runtime::affine::AffinityThread;

use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, trace, warn};

/// A runnable unit of work that can be executed by a runner.
///
/// The `Runnable` trait erases the return type of the work, allowing both
/// runners to keep a heterogeneous queue of `Box<dyn Runnable>`.
///
/// Dropping a runnable without running it cancels its task.
pub(crate) trait Runnable: Send {
    /// Executes the work on the current thread.
    ///
    /// Returns `false` if the task had been cancelled and the work was skipped.
    fn run(self: Box<Self>) -> bool;
}

/// A queued unit of work, as stored by the runners.
pub(crate) type Job = Box<dyn Runnable>;

/// Terminal outcome of a task.
pub(crate) enum Outcome<T> {
    Completed(T),
    Failed(Failure),
    Cancelled,
}

/// State shared between a [`TaskHandle`] and the runner executing the work.
///
/// The terminal outcome is written exactly once under `outcome`'s lock and
/// published to every waiter through `done`. `state` mirrors the lifecycle so
/// that non-blocking queries never take the lock.
pub(crate) struct TaskCell<T> {
    pub(crate) state: AtomicUsize,

    pub(crate) outcome: Mutex<Option<Outcome<T>>>,

    pub(crate) done: Condvar,

    /// Set once a failure has been reported to at least one waiter.
    pub(crate) observed: AtomicBool,

    /// The affinity thread this task is bound to, if any.
    pub(crate) affinity: Option<Arc<AffinityThread>>,
}

impl<T> TaskCell<T> {
    fn new(affinity: Option<Arc<AffinityThread>>) -> Self {
        Self {
            state: AtomicUsize::new(PENDING),
            outcome: Mutex::new(None),
            done: Condvar::new(),
            observed: AtomicBool::new(false),
            affinity,
        }
    }

    /// Moves a pending task to `RUNNING`. Only one caller can succeed.
    fn begin(&self) -> bool {
        self.state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Stores the terminal outcome and wakes every waiter.
    fn publish(&self, state: usize, outcome: Outcome<T>) {
        let mut slot = self.outcome.lock();
        *slot = Some(outcome);
        self.state.store(state, Ordering::Release);
        self.done.notify_all();
    }

    /// Cancels the task if it has not started yet.
    pub(crate) fn cancel(&self) -> bool {
        if self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.publish(CANCELLED, Outcome::Cancelled);
        true
    }

    /// Cancels the task because its runner dropped it without an outcome.
    fn abandon(&self) {
        let transitioned = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                matches!(state, PENDING | RUNNING).then_some(CANCELLED)
            })
            .is_ok();

        if transitioned {
            trace!("task discarded by its runner");
            self.publish(CANCELLED, Outcome::Cancelled);
        }
    }
}

impl<T> Drop for TaskCell<T> {
    fn drop(&mut self) {
        if let Some(Outcome::Failed(failure)) = self.outcome.get_mut() {
            if !*self.observed.get_mut() {
                warn!(%failure, "task failed and its failure was never observed");
            }
        }
    }
}

/// Write capability over a task, owned by the runner.
///
/// It is consumed by the single terminal transition. A completer that is
/// dropped before completing cancels its task so that waiters never hang.
pub(crate) struct Completer<T> {
    cell: Option<Arc<TaskCell<T>>>,
}

impl<T> Completer<T> {
    fn begin(&self) -> bool {
        self.cell.as_ref().is_some_and(|cell| cell.begin())
    }

    fn finish(mut self, result: thread::Result<T>) {
        let Some(cell) = self.cell.take() else {
            return;
        };

        match result {
            Ok(value) => cell.publish(COMPLETED, Outcome::Completed(value)),
            Err(payload) => {
                let failure = Failure::from_panic(payload);
                debug!(%failure, "task panicked");
                cell.publish(FAILED, Outcome::Failed(failure));
            }
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.take() {
            cell.abandon();
        }
    }
}

/// A unit of work paired with the completer of its task.
pub(crate) struct Task<F, T> {
    work: F,
    completer: Completer<T>,
}

impl<F, T> Task<F, T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    /// Creates a queued job and the handle observing it.
    ///
    /// The task starts in the `PENDING` state. `affinity` is set for work that
    /// must run on the affinity thread, which lets the handle detect
    /// self-deadlocking waits.
    pub(crate) fn new(work: F, affinity: Option<Arc<AffinityThread>>) -> (Job, TaskHandle<T>) {
        let cell = Arc::new(TaskCell::new(affinity));

        let task = Task {
            work,
            completer: Completer {
                cell: Some(cell.clone()),
            },
        };

        (Box::new(task), TaskHandle { cell })
    }
}

impl<F, T> Runnable for Task<F, T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    fn run(self: Box<Self>) -> bool {
        let Task { work, completer } = *self;

        // A cancelled task never runs, even if it is still queued.
        if !completer.begin() {
            trace!("skipping cancelled task");
            return false;
        }

        // Panics stay inside the task; the runner thread keeps going.
        let result = panic::catch_unwind(AssertUnwindSafe(work));
        completer.finish(result);

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::runtime::task::TaskState;

    use std::sync::OnceLock;

    #[test]
    fn run_completes_the_handle() {
        let (job, handle) = Task::new(|| 21 * 2, None);

        assert_eq!(handle.state(), TaskState::Pending);
        assert!(job.run());
        assert_eq!(handle.state(), TaskState::Completed);
        assert_eq!(handle.wait().unwrap(), 42);
    }

    #[test]
    fn panic_is_captured_as_failure() {
        let (job, handle) = Task::new(|| -> u8 { panic!("corrupt asset") }, None);

        assert!(job.run());
        assert_eq!(handle.state(), TaskState::Failed);

        let error = handle.wait().unwrap_err();
        assert_eq!(error.failure().map(|f| f.message()), Some("corrupt asset"));
    }

    #[test]
    fn cancelled_task_is_skipped() {
        let (job, handle) = Task::new(|| -> u8 { panic!("must not run") }, None);

        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(!job.run());
        assert!(matches!(handle.wait(), Err(Error::Cancelled)));
    }

    #[test]
    fn dropping_the_job_cancels_the_handle() {
        let (job, handle) = Task::new(|| 1, None);

        drop(job);

        assert_eq!(handle.state(), TaskState::Cancelled);
        assert!(handle.is_done());
        assert!(matches!(handle.wait(), Err(Error::Cancelled)));
    }

    #[test]
    fn running_task_cannot_be_cancelled() {
        let slot: Arc<OnceLock<TaskHandle<bool>>> = Arc::new(OnceLock::new());
        let own = slot.clone();

        let (job, handle) = Task::new(
            move || {
                own.get()
                    .is_some_and(|h| !h.cancel() && h.state() == TaskState::Running)
            },
            None,
        );
        let _ = slot.set(handle.clone());

        assert!(job.run());
        assert!(handle.wait().unwrap());
    }
}
