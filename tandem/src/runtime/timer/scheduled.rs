use super::core::{Command, TimerHandle};
use super::entry::EntryState;

use std::fmt;
use std::sync::Arc;

/// A handle to a delayed one-shot action.
///
/// Returned by [`ExecutorHandle::schedule`](crate::ExecutorHandle::schedule)
/// and [`ExecutorHandle::schedule_affine`](crate::ExecutorHandle::schedule_affine).
/// Dropping it does not cancel the action.
#[derive(Clone)]
pub struct ScheduledHandle {
    pub(crate) state: Arc<EntryState>,
    pub(crate) timer: TimerHandle,
}

impl ScheduledHandle {
    /// Prevents the action from firing.
    ///
    /// Returns `true` if this call cancelled the action. Cancelling twice,
    /// or after the action fired, is a no-op that returns `false`; an action
    /// that already fired is not interrupted.
    pub fn cancel(&self) -> bool {
        if !self.state.try_cancel() {
            return false;
        }

        // Purging only frees the slot early; the entry is inert either way.
        let _ = self.timer.send(Command::Purge);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// Returns `true` once the action was handed to its runner.
    pub fn is_fired(&self) -> bool {
        self.state.is_fired()
    }

    /// Returns `true` once the entry either fired or was cancelled.
    pub fn is_done(&self) -> bool {
        self.is_fired() || self.is_cancelled()
    }
}

impl fmt::Debug for ScheduledHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledHandle")
            .field("fired", &self.is_fired())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
