use super::core::{Outcome, TaskCell};
use super::state::TaskState;
use crate::error::{Error, Result};
use crate::runtime::context;

use parking_lot::MutexGuard;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::warn;

/// How long a pool worker parks between attempts to run its own spawned
/// jobs while it waits on a handle.
const HELP_INTERVAL: Duration = Duration::from_millis(1);

/// A handle to a submitted unit of work.
///
/// A `TaskHandle` is returned as soon as work is submitted, before it may
/// have started. It can be cloned freely; every clone observes the same
/// task, and every waiter sees the same terminal outcome.
///
/// Dropping the handle does **not** cancel the work; it only discards the
/// ability to observe its result (fire-and-forget).
pub struct TaskHandle<T> {
    pub(crate) cell: Arc<TaskCell<T>>,
}

impl<T> TaskHandle<T> {
    /// Returns the current lifecycle state without blocking.
    pub fn state(&self) -> TaskState {
        TaskState::from_raw(self.cell.state.load(Ordering::Acquire))
    }

    /// Returns `true` once the task completed, failed or was cancelled.
    ///
    /// Never blocks.
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Cancels the task if no runner has started it yet.
    ///
    /// Returns `true` if this call cancelled the task. Work that is already
    /// running always runs to completion, in which case this returns `false`.
    pub fn cancel(&self) -> bool {
        self.cell.cancel()
    }
}

impl<T: Clone> TaskHandle<T> {
    /// Blocks the current thread until the task reaches a terminal state.
    ///
    /// The result is cloned for every waiter; wrap large results in an
    /// `Arc` to share them cheaply.
    ///
    /// When called from a background worker, the worker runs jobs it spawned
    /// itself that are still in its local queue while it waits, so nested
    /// submissions cannot starve the pool. Other queued work is never run
    /// inside a wait.
    ///
    /// # Errors
    ///
    /// - [`Error::Computation`] if the work panicked.
    /// - [`Error::Cancelled`] if the task was cancelled or discarded by a
    ///   shutdown before it ran.
    /// - [`Error::Deadlock`] if called on the affinity thread for affine work
    ///   that has not completed yet. That work can only run when the affinity
    ///   thread drains its queue, so waiting there would never return.
    pub fn wait(&self) -> Result<T> {
        self.wait_until(None)
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimedOut`] if the task is still running when the
    /// timeout elapses, in addition to the errors of [`wait`](Self::wait).
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T> {
        self.wait_until(Instant::now().checked_add(timeout))
    }

    fn wait_until(&self, deadline: Option<Instant>) -> Result<T> {
        self.check_deadlock()?;

        let mut outcome = self.cell.outcome.lock();

        loop {
            if outcome.is_some() {
                return self.observe(&outcome);
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(Error::TimedOut);
            }

            if context::is_worker() {
                let helped = MutexGuard::unlocked(&mut outcome, context::help);

                if !helped && outcome.is_none() {
                    self.cell.done.wait_for(&mut outcome, HELP_INTERVAL);
                }

                continue;
            }

            match deadline {
                Some(deadline) => {
                    self.cell.done.wait_until(&mut outcome, deadline);
                }
                None => self.cell.done.wait(&mut outcome),
            }
        }
    }

    fn check_deadlock(&self) -> Result<()> {
        let Some(affinity) = &self.cell.affinity else {
            return Ok(());
        };

        if affinity.is_current() && !self.is_done() {
            warn!("wait() called on the affinity thread for pending affine work");
            return Err(Error::Deadlock);
        }

        Ok(())
    }

    fn observe(&self, outcome: &Option<Outcome<T>>) -> Result<T> {
        match outcome {
            Some(Outcome::Completed(value)) => Ok(value.clone()),
            Some(Outcome::Failed(failure)) => {
                self.cell.observed.store(true, Ordering::Release);
                Err(Error::Computation(failure.clone()))
            }
            Some(Outcome::Cancelled) | None => Err(Error::Cancelled),
        }
    }
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("state", &self.state())
            .field("affine", &self.cell.affinity.is_some())
            .finish()
    }
}
