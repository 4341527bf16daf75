use super::ExecutorService;
use crate::error::Result;

use std::thread;

/// Prefix given to executor threads unless configured otherwise.
const DEFAULT_THREAD_NAME: &str = "tandem";

/// Builder for configuring and creating an [`ExecutorService`].
///
/// `ExecutorBuilder` allows customizing executor parameters before the
/// worker and timer threads are started.
///
/// # Examples
///
/// ```rust,ignore
/// let executor = ExecutorBuilder::new()
///     .worker_threads(4)
///     .thread_name("assets")
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct ExecutorBuilder {
    /// Number of background worker threads.
    worker_threads: usize,

    /// Naming and stack size of every spawned thread.
    threads: ThreadConfig,
}

/// Settings shared by every thread the executor spawns.
#[derive(Debug, Clone)]
pub(crate) struct ThreadConfig {
    name: String,
    stack_size: Option<usize>,
}

impl ThreadConfig {
    /// Returns a thread builder named `{prefix}-{role}`.
    pub(crate) fn builder(&self, role: &str) -> thread::Builder {
        let builder = thread::Builder::new().name(format!("{}-{role}", self.name));

        match self.stack_size {
            Some(size) => builder.stack_size(size),
            None => builder,
        }
    }
}

impl ExecutorBuilder {
    /// Creates a new `ExecutorBuilder` with default configuration.
    ///
    /// By default, the number of worker threads is set to the number
    /// of available logical CPUs, falling back to `1` if unavailable.
    pub fn new() -> Self {
        let worker_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            worker_threads,
            threads: ThreadConfig {
                name: DEFAULT_THREAD_NAME.to_owned(),
                stack_size: None,
            },
        }
    }

    /// Sets the number of background worker threads.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn worker_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "worker_threads must be > 0");

        self.worker_threads = n;
        self
    }

    /// Sets the prefix of thread names.
    ///
    /// Workers are named `{prefix}-worker-{id}` and the timer thread
    /// `{prefix}-timer`.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.threads.name = prefix.into();
        self
    }

    /// Sets the stack size, in bytes, of every executor thread.
    pub fn thread_stack_size(mut self, size: usize) -> Self {
        self.threads.stack_size = Some(size);
        self
    }

    /// Builds the executor with the configured options.
    ///
    /// This starts the worker pool and the timer thread. The affinity
    /// thread is not started: it is whichever thread drives
    /// [`ExecutorService::process_queued`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`](crate::Error::Spawn) if a thread cannot be
    /// started.
    pub fn build(self) -> Result<ExecutorService> {
        ExecutorService::start(self.worker_threads, &self.threads)
    }
}

impl Default for ExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
