use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{self, AtomicU8};
use std::time::Instant;

/// Entry is waiting for its deadline.
const SCHEDULED: u8 = 0;

/// Entry fired; its action was dispatched.
const FIRED: u8 = 1;

/// Entry was cancelled and must never fire.
const CANCELLED: u8 = 2;

/// Lifecycle of one scheduled entry, shared between the timer thread and
/// the caller's [`ScheduledHandle`](super::ScheduledHandle).
///
/// Firing and cancelling race on the same atomic, so exactly one of them
/// wins.
pub(crate) struct EntryState(AtomicU8);

impl EntryState {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(SCHEDULED))
    }

    fn transition(&self, to: u8) -> bool {
        self.0
            .compare_exchange(
                SCHEDULED,
                to,
                atomic::Ordering::AcqRel,
                atomic::Ordering::Acquire,
            )
            .is_ok()
    }

    /// Claims the entry for firing. Fails if it was cancelled.
    pub(crate) fn try_fire(&self) -> bool {
        self.transition(FIRED)
    }

    /// Cancels the entry. Fails if it already fired or was cancelled.
    pub(crate) fn try_cancel(&self) -> bool {
        self.transition(CANCELLED)
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.0.load(atomic::Ordering::Acquire) == FIRED
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.0.load(atomic::Ordering::Acquire) == CANCELLED
    }
}

/// Dispatches a fired entry to one of the runners.
pub(crate) type Dispatch = Box<dyn FnOnce() + Send>;

/// An entry in the timer queue.
///
/// `TimerEntry` represents a one-shot action due at a specific deadline.
/// It is stored inside a binary heap ordered by deadline, then by the
/// order in which entries reached the timer.
pub(crate) struct TimerEntry {
    /// The time at which the entry should fire.
    pub(crate) deadline: Instant,

    /// Arrival order at the timer thread, used to break deadline ties.
    pub(crate) sequence: u64,

    /// Cancellation state shared with the scheduled handle.
    pub(crate) state: Arc<EntryState>,

    /// Action run on the timer thread when the entry fires. Taken on fire.
    pub(crate) dispatch: Option<Dispatch>,
}

impl TimerEntry {
    /// Fires the entry unless it was cancelled first.
    ///
    /// The cancellation check happens here, at fire time, so an entry
    /// cancelled after it became due still never runs.
    pub(crate) fn fire(mut self) -> bool {
        if !self.state.try_fire() {
            return false;
        }

        if let Some(dispatch) = self.dispatch.take() {
            dispatch();
        }

        true
    }
}

impl Drop for TimerEntry {
    /// An entry that goes away without firing is cancelled, wherever it was
    /// dropped: in the heap, in the command channel, or in a failed send.
    fn drop(&mut self) {
        self.state.try_cancel();
    }
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}

impl Ord for TimerEntry {
    /// Orders timer entries by deadline, then by sequence.
    ///
    /// Note that the comparison is **reversed** so that a
    /// `BinaryHeap<TimerEntry>` behaves as a min-heap,
    /// where the earliest deadline is popped first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
