use crate::runtime::background::worker::Worker;

use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    /// The background worker running on the current thread, if any.
    ///
    /// Set for the lifetime of a pool thread. It lets submissions made from
    /// inside a job reach the worker's local queue, and lets a worker that
    /// blocks on a task keep the pool busy, without passing the worker
    /// through every API.
    static CURRENT_WORKER: RefCell<Option<Arc<Worker>>> = const { RefCell::new(None) };
}

/// Installs `worker` as the current thread's worker for the duration of `f`.
///
/// The previous context is restored once the closure returns.
pub(crate) fn enter_worker<R>(worker: Arc<Worker>, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_WORKER.with(|cell| cell.replace(Some(worker)));

    let out = f();

    CURRENT_WORKER.with(|cell| cell.replace(previous));

    out
}

/// Returns the worker running on the current thread.
pub(crate) fn current_worker() -> Option<Arc<Worker>> {
    CURRENT_WORKER.with(|cell| cell.borrow().clone())
}

pub(crate) fn is_worker() -> bool {
    CURRENT_WORKER.with(|cell| cell.borrow().is_some())
}

/// Runs the newest job in the current worker's own local queue.
///
/// Only jobs spawned from this worker are taken; the global injector and
/// the peers' queues are left alone. Once the pool is aborted the job is
/// dropped, which cancels it, instead of run.
///
/// Returns `false` if the current thread is not a worker or its local
/// queue is empty.
pub(crate) fn help() -> bool {
    let Some(worker) = current_worker() else {
        return false;
    };

    let Some(job) = worker.local().pop() else {
        return false;
    };

    if !worker.injector().is_aborted() {
        job.run();
    }

    true
}
