use crate::runtime::context;
use crate::runtime::task::Job;
use crate::runtime::work_stealing::injector::InjectorHandle;
use crate::runtime::work_stealing::queue::LocalQueue;

use std::sync::Arc;
use tracing::debug;

/// A worker thread of the background pool.
///
/// A `Worker` executes jobs using a work-stealing strategy. Each worker
/// owns a local queue and cooperates with other workers to balance load.
///
/// The lookup order is:
/// 1. Pop from the local queue
/// 2. Steal from the global injector
/// 3. Steal from other workers
/// 4. Park if no work is available
pub(crate) struct Worker {
    /// Unique identifier of the worker within its pool.
    id: usize,

    /// All local queues (one per worker).
    ///
    /// Used for stealing work from other workers.
    locals: Arc<Vec<Arc<LocalQueue>>>,

    /// Handle to the global injector queue.
    injector: InjectorHandle,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        locals: Arc<Vec<Arc<LocalQueue>>>,
        injector: InjectorHandle,
    ) -> Self {
        Self {
            id,
            locals,
            injector,
        }
    }

    pub(crate) fn injector(&self) -> &InjectorHandle {
        &self.injector
    }

    /// The local queue owned by this worker.
    pub(crate) fn local(&self) -> &LocalQueue {
        &self.locals[self.id]
    }

    /// Runs the worker loop until the pool shuts down.
    ///
    /// A closed pool keeps the worker running until every queue it can see
    /// is empty; an aborted pool stops it after the current job.
    pub(crate) fn run(self: Arc<Self>) {
        debug!(worker = self.id, "background worker started");

        context::enter_worker(self.clone(), || {
            loop {
                if self.injector.is_aborted() {
                    break;
                }

                if let Some(job) = self.next_job() {
                    job.run();
                    continue;
                }

                if self.injector.is_closed() {
                    break;
                }

                self.injector.park();
            }
        });

        // Jobs pushed locally after the pool was drained are cancelled here.
        drop(self.local().drain());

        debug!(worker = self.id, "background worker stopped");
    }

    /// Finds the next job this worker should run, if any.
    fn next_job(&self) -> Option<Job> {
        if self.injector.is_aborted() {
            return None;
        }

        self.local()
            .pop()
            .or_else(|| self.injector.steal())
            .or_else(|| self.try_steal())
    }

    /// Attempts to steal a job from another worker's local queue.
    ///
    /// Workers are visited in a round-robin fashion to avoid
    /// starvation and distribute load evenly.
    fn try_steal(&self) -> Option<Job> {
        let len = self.locals.len();

        if len <= 1 {
            return None;
        }

        (1..len)
            .map(|i| (self.id + i) % len)
            .find_map(|victim| self.locals[victim].steal())
    }
}
