use super::worker::Worker;
use crate::error::{Error, Result};
use crate::runtime::builder::ThreadConfig;
use crate::runtime::context;
use crate::runtime::task::{Job, Task, TaskHandle};
use crate::runtime::work_stealing::injector::{Injector, InjectorHandle};
use crate::runtime::work_stealing::queue::LocalQueue;

use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Runs work on a multi-threaded work-stealing pool.
///
/// The `BackgroundRunner` is responsible for:
/// - spawning the worker threads,
/// - routing submissions to the global injector or, from inside a worker,
///   to that worker's local queue,
/// - orderly shutdown and thread joining.
///
/// No ordering is guaranteed between jobs; the pool may run them
/// concurrently or interleaved.
pub(crate) struct BackgroundRunner {
    /// Global injector queue shared by all workers.
    injector: InjectorHandle,

    /// Local queues of every worker, used to discard leftovers on shutdown.
    locals: Arc<Vec<Arc<LocalQueue>>>,

    /// Join handles for worker threads.
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundRunner {
    /// Starts a pool of `threads` workers.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a worker thread cannot be spawned. Workers
    /// started before the failure are stopped and joined.
    pub(crate) fn start(threads: usize, config: &ThreadConfig) -> io::Result<Self> {
        let injector = Arc::new(Injector::new());

        let locals: Arc<Vec<_>> = Arc::new(
            (0..threads)
                .map(|_| Arc::new(LocalQueue::new()))
                .collect(),
        );

        let runner = Self {
            injector,
            locals,
            handles: Mutex::new(Vec::with_capacity(threads)),
        };

        for id in 0..threads {
            let worker = Arc::new(Worker::new(
                id,
                runner.locals.clone(),
                runner.injector.clone(),
            ));

            let spawned = config
                .builder(&format!("worker-{id}"))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => runner.handles.lock().push(handle),
                Err(error) => {
                    runner.abort();
                    runner.join();
                    return Err(error);
                }
            }
        }

        debug!(threads, "background pool started");
        Ok(runner)
    }

    /// Submits `work` to the pool and returns its handle immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once the pool is closed.
    pub(crate) fn submit<F, T>(&self, work: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (job, handle) = Task::new(work, None);
        self.push(job)?;
        Ok(handle)
    }

    /// Queues an already built job.
    ///
    /// From inside one of this pool's workers the job goes to the worker's
    /// local queue; from anywhere else it goes to the global injector.
    pub(crate) fn push(&self, job: Job) -> Result<()> {
        if let Some(worker) = context::current_worker() {
            if Arc::ptr_eq(worker.injector(), &self.injector) {
                if self.injector.is_closed() {
                    return Err(Error::ServiceShutdown);
                }

                trace!("job queued on local worker queue");
                worker.local().push(job);
                return Ok(());
            }
        }

        trace!("job queued on global injector");
        self.injector.push(job)
    }

    /// Stops accepting jobs; workers finish what is queued and exit.
    pub(crate) fn close(&self) {
        self.injector.close();
    }

    /// Stops accepting jobs and cancels every job still queued; workers
    /// exit after their current job.
    ///
    /// Cancelling before any join releases running jobs that wait on a
    /// queued one.
    pub(crate) fn abort(&self) {
        self.injector.abort();

        let discarded = self.discard_queued();
        if discarded > 0 {
            debug!(jobs = discarded, "cancelling jobs left in the pool");
        }
    }

    /// Returns `true` if the current thread is one of this pool's workers.
    pub(crate) fn is_current_worker(&self) -> bool {
        context::current_worker()
            .is_some_and(|worker| Arc::ptr_eq(worker.injector(), &self.injector))
    }

    /// Drops every queued job, which cancels its task, and returns how many
    /// there were.
    fn discard_queued(&self) -> usize {
        let mut leftover = self.injector.drain();
        for local in self.locals.iter() {
            leftover.extend(local.drain());
        }

        leftover.len()
    }

    /// Waits for all worker threads to terminate, then cancels any job
    /// still left in the queues.
    ///
    /// Must be called after [`close`](Self::close) or
    /// [`abort`](Self::abort). A worker never joins itself.
    pub(crate) fn join(&self) {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        let current = thread::current().id();

        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }

            if handle.join().is_err() {
                warn!("background worker thread panicked");
            }
        }

        let discarded = self.discard_queued();
        if discarded > 0 {
            debug!(jobs = discarded, "cancelling jobs left in the pool");
        }
    }
}
