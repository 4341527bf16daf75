use super::ScheduledHandle;
use super::entry::{Dispatch, EntryState, TimerEntry};
use crate::error::{Error, Result};
use crate::runtime::builder::ThreadConfig;

use std::collections::BinaryHeap;
use std::io;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, SendError, Sender, channel};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Deadline used when `now + delay` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Messages sent to the timer thread.
pub(crate) enum Command {
    /// Adds a one-shot entry to the queue. Its sequence is assigned on
    /// arrival.
    Schedule(TimerEntry),

    /// Drops cancelled entries from the queue.
    Purge,

    /// Stops the timer thread. Pending entries are cancelled.
    Shutdown,
}

/// The timer.
///
/// The timer runs on a dedicated thread and owns a min-heap of scheduled
/// entries. It sleeps until the earliest deadline or the next command,
/// whichever comes first, then fires every entry that is due.
///
/// It knows nothing about pause state elsewhere in the application; entries
/// fire as soon as they are due.
pub(crate) struct Timer {
    /// Channel receiving commands from submitters.
    receiver: Receiver<Command>,

    /// Min-heap of pending entries ordered by deadline.
    timers: BinaryHeap<TimerEntry>,

    /// Sequence number given to the next entry.
    next_sequence: u64,
}

/// A handle used to communicate with the timer thread.
#[derive(Clone)]
pub(crate) struct TimerHandle {
    /// Sender side of the command channel.
    sender: Sender<Command>,
}

impl TimerHandle {
    pub(crate) fn send(&self, cmd: Command) -> std::result::Result<(), SendError<Command>> {
        self.sender.send(cmd)
    }

    /// Registers `dispatch` to run on the timer thread once `delay` elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] if the timer thread has stopped.
    pub(crate) fn schedule(&self, delay: Duration, dispatch: Dispatch) -> Result<ScheduledHandle> {
        let now = Instant::now();
        let deadline = now
            .checked_add(delay)
            .unwrap_or_else(|| now + FAR_FUTURE);

        let state = Arc::new(EntryState::new());

        self.send(Command::Schedule(TimerEntry {
            deadline,
            sequence: 0,
            state: state.clone(),
            dispatch: Some(dispatch),
        }))
        .map_err(|_| Error::ServiceShutdown)?;

        trace!(?delay, "entry scheduled");

        Ok(ScheduledHandle {
            state,
            timer: self.clone(),
        })
    }
}

impl Timer {
    fn new(receiver: Receiver<Command>) -> Self {
        Self {
            receiver,
            timers: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    /// Starts the timer thread and returns a handle to it.
    pub(crate) fn start(config: &ThreadConfig) -> io::Result<(TimerHandle, JoinHandle<()>)> {
        let (sender, receiver) = channel();

        let thread = config.builder("timer").spawn(move || {
            let mut timer = Timer::new(receiver);
            timer.run();
        })?;

        Ok((TimerHandle { sender }, thread))
    }

    /// Main timer loop.
    ///
    /// The loop performs the following steps:
    /// 1. Wait for a command, at most until the earliest deadline
    /// 2. Apply the command
    /// 3. Fire expired entries
    fn run(&mut self) {
        debug!("timer thread started");

        loop {
            let timeout = self
                .timers
                .peek()
                .map(|t| t.deadline.saturating_duration_since(Instant::now()));

            let received = match timeout {
                Some(timeout) => self.receiver.recv_timeout(timeout),
                None => self
                    .receiver
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(Command::Schedule(mut entry)) => {
                    entry.sequence = self.next_sequence;
                    self.next_sequence += 1;

                    self.timers.push(entry);
                }
                Ok(Command::Purge) => {
                    self.timers.retain(|entry| !entry.state.is_cancelled());
                }
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            self.fire_expired();
        }

        let cancelled = self.cancel_pending() + self.cancel_late();
        debug!(cancelled, "timer thread stopped");
    }

    /// Pops and fires every entry whose deadline has passed.
    fn fire_expired(&mut self) {
        let now = Instant::now();

        while self.timers.peek().is_some_and(|t| t.deadline <= now) {
            let Some(entry) = self.timers.pop() else {
                break;
            };

            if entry.fire() {
                trace!("scheduled entry fired");
            }
        }
    }

    /// Cancels every entry still in the queue and returns how many there were.
    fn cancel_pending(&mut self) -> usize {
        self.timers
            .drain()
            .filter(|entry| entry.state.try_cancel())
            .count()
    }

    /// Cancels entries that reached the channel after `Shutdown`.
    ///
    /// Anything sent once the receiver is gone fails to send and is
    /// cancelled when the entry drops.
    fn cancel_late(&mut self) -> usize {
        let mut cancelled = 0;

        while let Ok(command) = self.receiver.try_recv() {
            if let Command::Schedule(entry) = command {
                if entry.state.try_cancel() {
                    cancelled += 1;
                }
            }
        }

        cancelled
    }
}
