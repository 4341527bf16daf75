/// Task is queued and has not been picked up by a runner yet.
pub(crate) const PENDING: usize = 0;

/// Task is currently being executed by a runner.
///
/// At most one runner may move a task into this state.
pub(crate) const RUNNING: usize = 1;

/// The work returned a value.
pub(crate) const COMPLETED: usize = 2;

/// The work panicked; the failure is stored in the task.
pub(crate) const FAILED: usize = 3;

/// The task was cancelled before it ran, or its runner discarded it.
pub(crate) const CANCELLED: usize = 4;

/// Observable lifecycle of a task.
///
/// Transitions are one-directional:
/// `Pending -> Running -> Completed | Failed`, or `Pending | Running -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub(crate) fn from_raw(raw: usize) -> Self {
        match raw {
            PENDING => TaskState::Pending,
            RUNNING => TaskState::Running,
            COMPLETED => TaskState::Completed,
            FAILED => TaskState::Failed,
            _ => TaskState::Cancelled,
        }
    }

    /// Returns `true` once the task can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}
