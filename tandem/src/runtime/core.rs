use super::affine::AffineRunner;
use super::background::BackgroundRunner;
use super::builder::ThreadConfig;
use super::task::{Task, TaskHandle};
use super::timer::{Command, ScheduledHandle, Timer, TimerHandle};
use crate::error::{Error, Result};

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Where a fired scheduled entry is dispatched.
#[derive(Debug, Clone, Copy)]
enum Target {
    Background,
    Affine,
}

/// How queued work is treated during teardown.
#[derive(Debug, Clone, Copy)]
enum Teardown {
    /// Queued background jobs still run.
    Graceful,
    /// Queued background jobs are cancelled.
    Immediate,
}

/// State shared by the service and every handle to it.
struct Shared {
    background: BackgroundRunner,
    affine: AffineRunner,
    timer: TimerHandle,

    /// Join handle of the timer thread, taken on shutdown.
    timer_thread: Mutex<Option<JoinHandle<()>>>,

    shutdown: AtomicBool,

    /// Held for the whole teardown so that every caller returns only once
    /// the threads are joined.
    teardown: Mutex<()>,
}

impl Shared {
    fn ensure_running(&self) -> Result<()> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(Error::ServiceShutdown);
        }

        Ok(())
    }

    /// Shuts down all internal components in an orderly fashion.
    ///
    /// This performs the following steps:
    /// 1. Rejects new submissions
    /// 2. Stops the timer thread; entries that have not fired are cancelled
    /// 3. Cancels affine jobs that were never drained
    /// 4. Closes (or aborts) the pool and joins its workers
    ///
    /// Concurrent callers are serialized. An immediate teardown aborts the
    /// pool before queueing behind a graceful one, so it still cancels the
    /// queued jobs. A pool worker skips the lock: the holder may be joining
    /// it.
    fn shutdown(&self, mode: Teardown) {
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            debug!(?mode, "executor service shutting down");
        }

        if let Teardown::Immediate = mode {
            self.background.abort();
        }

        let _teardown = (!self.background.is_current_worker()).then(|| self.teardown.lock());

        let _ = self.timer.send(Command::Shutdown);

        let timer_thread = self.timer_thread.lock().take();
        if let Some(timer_thread) = timer_thread {
            if timer_thread.thread().id() != thread::current().id() && timer_thread.join().is_err()
            {
                warn!("timer thread panicked");
            }
        }

        let undrained = self.affine.close();
        if !undrained.is_empty() {
            debug!(jobs = undrained.len(), "cancelling affine jobs that were never drained");
        }
        drop(undrained);

        if let Teardown::Graceful = mode {
            self.background.close();
        }

        self.background.join();
    }
}

/// The executor service.
///
/// `ExecutorService` owns:
/// - a work-stealing pool running background work,
/// - a FIFO queue of work bound to the affinity thread,
/// - a timer thread firing delayed one-shot actions.
///
/// The service is constructed explicitly through
/// [`ExecutorBuilder`](crate::ExecutorBuilder) and handed to collaborators
/// as cheap [`ExecutorHandle`]s. Dropping the service shuts it down
/// gracefully and joins its threads.
pub struct ExecutorService {
    handle: ExecutorHandle,
}

impl ExecutorService {
    /// Starts the pool and the timer thread.
    pub(crate) fn start(worker_threads: usize, config: &ThreadConfig) -> Result<Self> {
        let background = BackgroundRunner::start(worker_threads, config)?;

        let (timer, timer_thread) = match Timer::start(config) {
            Ok(started) => started,
            Err(error) => {
                background.close();
                background.join();
                return Err(Error::Spawn(error));
            }
        };

        let shared = Arc::new(Shared {
            background,
            affine: AffineRunner::new(),
            timer,
            timer_thread: Mutex::new(Some(timer_thread)),
            shutdown: AtomicBool::new(false),
            teardown: Mutex::new(()),
        });

        debug!(worker_threads, "executor service started");

        Ok(Self {
            handle: ExecutorHandle { shared },
        })
    }

    /// Returns a clonable handle for submitting work.
    pub fn handle(&self) -> ExecutorHandle {
        self.handle.clone()
    }

    /// Returns the driver the render/update loop uses to drain affine work.
    pub fn affinity_driver(&self) -> AffinityDriver {
        AffinityDriver {
            shared: self.handle.shared.clone(),
        }
    }

    /// See [`ExecutorHandle::spawn`].
    pub fn spawn<F, T>(&self, work: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.handle.spawn(work)
    }

    /// See [`ExecutorHandle::spawn_affine`].
    pub fn spawn_affine<F, T>(&self, work: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.handle.spawn_affine(work)
    }

    /// See [`ExecutorHandle::execute`].
    pub fn execute<F>(&self, work: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.execute(work)
    }

    /// See [`ExecutorHandle::schedule`].
    pub fn schedule<F>(&self, action: F, delay: Duration) -> Result<ScheduledHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.schedule(action, delay)
    }

    /// See [`ExecutorHandle::schedule_affine`].
    pub fn schedule_affine<F>(&self, action: F, delay: Duration) -> Result<ScheduledHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.schedule_affine(action, delay)
    }

    /// See [`AffinityDriver::process_queued`].
    pub fn process_queued(&self) -> usize {
        self.handle.shared.affine.process_queued()
    }

    /// See [`AffinityDriver::bind`].
    pub fn bind_affinity_thread(&self) -> bool {
        self.handle.shared.affine.bind()
    }

    /// Shuts the service down gracefully.
    ///
    /// New submissions fail with [`Error::ServiceShutdown`], scheduled
    /// entries that have not fired are cancelled, affine work that was never
    /// drained is cancelled, and background work that is already queued
    /// runs to completion before this call returns.
    ///
    /// Calling it more than once is harmless.
    pub fn shutdown(&self) {
        self.handle.shared.shutdown(Teardown::Graceful);
    }

    /// Shuts the service down without running queued work.
    ///
    /// Like [`shutdown`](Self::shutdown), but background jobs that have not
    /// started are cancelled too. Jobs already running finish first.
    pub fn shutdown_now(&self) {
        self.handle.shared.shutdown(Teardown::Immediate);
    }

    pub fn is_shutdown(&self) -> bool {
        self.handle.is_shutdown()
    }
}

impl Drop for ExecutorService {
    fn drop(&mut self) {
        self.handle.shared.shutdown(Teardown::Graceful);
    }
}

impl fmt::Debug for ExecutorService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorService")
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

/// A clonable handle for submitting work to an [`ExecutorService`].
///
/// Handles can be moved to any thread, including into submitted work.
/// Once the service shuts down, every submission through a handle fails
/// with [`Error::ServiceShutdown`].
#[derive(Clone)]
pub struct ExecutorHandle {
    shared: Arc<Shared>,
}

impl ExecutorHandle {
    /// Runs `work` on the background pool.
    ///
    /// The handle is returned immediately, possibly before the work starts.
    /// A panic inside `work` is captured in the handle; the worker thread
    /// survives. No ordering is guaranteed between background jobs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] after teardown began.
    pub fn spawn<F, T>(&self, work: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.shared.ensure_running()?;
        self.shared.background.submit(work)
    }

    /// Queues `work` for the affinity thread.
    ///
    /// The work runs during the next
    /// [`process_queued`](AffinityDriver::process_queued) call, after every
    /// affine job submitted before it. It never runs if nothing drives the
    /// affinity queue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] after teardown began.
    pub fn spawn_affine<F, T>(&self, work: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.shared.ensure_running()?;
        self.shared.affine.submit(work)
    }

    /// Runs `work` on the background pool without returning a handle.
    ///
    /// A panic inside `work` is logged and otherwise dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] after teardown began.
    pub fn execute<F>(&self, work: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.ensure_running()?;

        let (job, _) = Task::new(work, None);
        self.shared.background.push(job)
    }

    /// Runs `action` on the background pool once `delay` elapsed.
    ///
    /// The delay is measured on the timer thread and is unaffected by any
    /// pause state of the application. The action fires no earlier than
    /// `delay`, possibly later under load.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] after teardown began.
    pub fn schedule<F>(&self, action: F, delay: Duration) -> Result<ScheduledHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_on(Target::Background, action, delay)
    }

    /// Queues `action` for the affinity thread once `delay` elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] after teardown began.
    pub fn schedule_affine<F>(&self, action: F, delay: Duration) -> Result<ScheduledHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_on(Target::Affine, action, delay)
    }

    fn schedule_on<F>(&self, target: Target, action: F, delay: Duration) -> Result<ScheduledHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.ensure_running()?;

        let shared: Weak<Shared> = Arc::downgrade(&self.shared);

        let dispatch = Box::new(move || {
            let Some(shared) = shared.upgrade() else {
                return;
            };

            let (job, _) = Task::new(action, None);
            let queued = match target {
                Target::Background => shared.background.push(job),
                Target::Affine => shared.affine.push(job),
            };

            if let Err(error) = queued {
                trace!(?target, %error, "fired entry dropped");
            }
        });

        self.shared.timer.schedule(delay, dispatch)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ExecutorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorHandle")
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

/// Drains affine work on behalf of the render/update loop.
///
/// The loop that owns the affinity thread calls
/// [`process_queued`](Self::process_queued) once per tick. Application code
/// waits on handles; the driver drains. The two roles must not be mixed on
/// the affinity thread: waiting there for pending affine work returns
/// [`Error::Deadlock`].
pub struct AffinityDriver {
    shared: Arc<Shared>,
}

impl AffinityDriver {
    /// Runs every affine job queued so far, in submission order, each to
    /// completion, and returns how many ran.
    ///
    /// Jobs submitted while draining run on the next call. Calls made from
    /// inside an affine job return `0`. Queued work keeps being accepted and
    /// drained until the service shuts down.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the affinity thread. The
    /// first thread to drain (or [`bind`](Self::bind)) becomes the affinity
    /// thread for the lifetime of the service.
    pub fn process_queued(&self) -> usize {
        self.shared.affine.process_queued()
    }

    /// Binds the calling thread as the affinity thread ahead of the first
    /// drain, so that deadlocking waits are detected from the start.
    ///
    /// Returns `false` if a different thread is already bound.
    pub fn bind(&self) -> bool {
        self.shared.affine.bind()
    }

    /// Number of affine jobs waiting for the next drain.
    pub fn pending(&self) -> usize {
        self.shared.affine.pending()
    }
}

impl fmt::Debug for AffinityDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AffinityDriver")
            .field("pending", &self.pending())
            .finish()
    }
}
